//! Integration tests for the OpenAI provider using wiremock.

use std::sync::Arc;

use futures::StreamExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chat_relay::provider::openai::OpenAiProvider;
use chat_relay::provider::{
    CompletionProvider, CompletionRequest, ProviderError, ProviderMessage, Role,
};
use chat_relay::relay::{ChatMessage, StreamFrame, StreamRelay};

fn minimal_request() -> CompletionRequest {
    CompletionRequest {
        messages: vec![ProviderMessage {
            role: Role::User,
            content: "Hello".into(),
        }],
        temperature: 0.7,
        max_tokens: 1000,
    }
}

fn sse_body(events: &[&str]) -> String {
    events.iter().map(|e| format!("data: {e}\n\n")).collect()
}

fn delta(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-abc",
        "object": "chat.completion.chunk",
        "choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]
    })
    .to_string()
}

fn sse_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

#[tokio::test]
async fn stream_sends_headers_and_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-api-key"))
        .and(header("openai-organization", "org-abc123"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-3.5-turbo",
            "messages": [{"role": "user", "content": "Hello"}],
            "temperature": 0.7,
            "max_tokens": 1000,
            "stream": true
        })))
        .respond_with(sse_response(sse_body(&["[DONE]"])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new()
        .api_key("test-api-key")
        .organization("org-abc123")
        .base_url(mock_server.uri());

    let stream = provider.stream_completion(minimal_request()).await.unwrap();
    let units: Vec<_> = stream.collect().await;
    assert!(units.is_empty());
}

#[tokio::test]
async fn stream_parses_deltas() {
    let mock_server = MockServer::start().await;

    let role = serde_json::json!({"choices": [{"index": 0, "delta": {"role": "assistant"}}]})
        .to_string();
    let body = sse_body(&[&role, &delta("Hel"), &delta("lo"), "[DONE]"]);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(sse_response(body))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new().base_url(mock_server.uri());
    let units: Vec<_> = provider
        .stream_completion(minimal_request())
        .await
        .unwrap()
        .collect()
        .await;

    let texts: Vec<Option<String>> = units
        .into_iter()
        .map(|u| u.unwrap().text_delta().map(str::to_owned))
        .collect();
    assert_eq!(texts, vec![None, Some("Hel".into()), Some("lo".into())]);
}

#[tokio::test]
async fn non_success_status_maps_to_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new().base_url(mock_server.uri());
    let err = match provider.stream_completion(minimal_request()).await {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    };

    match err {
        ProviderError::Status { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn missing_key_sends_no_authorization_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(sse_response(sse_body(&["[DONE]"])))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new().base_url(mock_server.uri());
    let units: Vec<_> = provider
        .stream_completion(minimal_request())
        .await
        .unwrap()
        .collect()
        .await;
    assert!(units.is_empty());

    let received = mock_server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(!received[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn relay_end_to_end() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hi"}
            ]
        })))
        .respond_with(sse_response(sse_body(&[&delta("Hel"), &delta("lo"), "[DONE]"])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = Arc::new(OpenAiProvider::new().api_key("k").base_url(mock_server.uri()));
    let relay = StreamRelay::new(provider);

    let messages: Vec<ChatMessage> = serde_json::from_value(serde_json::json!([
        {"role": "system", "content": "be brief"},
        {"role": "user", "content": "hi", "id": "m-1"}
    ]))
    .unwrap();

    let frames: Vec<_> = relay.relay(&messages, 0.7, 1000).collect().await;
    assert_eq!(
        frames,
        vec![
            StreamFrame::Text("Hel".into()),
            StreamFrame::Text("lo".into()),
            StreamFrame::Done,
        ]
    );
}

#[tokio::test]
async fn relay_surfaces_in_band_upstream_error() {
    let mock_server = MockServer::start().await;

    let error = serde_json::json!({"error": {"message": "Rate limit reached"}}).to_string();
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(sse_response(sse_body(&[&delta("Hi"), &error])))
        .mount(&mock_server)
        .await;

    let relay = StreamRelay::new(Arc::new(
        OpenAiProvider::new().base_url(mock_server.uri()),
    ));
    let messages: Vec<ChatMessage> =
        serde_json::from_value(serde_json::json!([{"role": "user", "content": "hi"}])).unwrap();

    let frames: Vec<_> = relay.relay(&messages, 0.7, 1000).collect().await;
    assert_eq!(
        frames,
        vec![
            StreamFrame::Text("Hi".into()),
            StreamFrame::Error("Provider error: Rate limit reached".into()),
        ]
    );
}

#[tokio::test]
async fn relay_surfaces_rejected_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&mock_server)
        .await;

    let relay = StreamRelay::new(Arc::new(
        OpenAiProvider::new().base_url(mock_server.uri()),
    ));
    let messages: Vec<ChatMessage> =
        serde_json::from_value(serde_json::json!([{"role": "user", "content": "hi"}])).unwrap();

    let frames: Vec<_> = relay.relay(&messages, 0.7, 1000).collect().await;
    assert_eq!(
        frames,
        vec![StreamFrame::Error(
            "Provider returned HTTP 500: internal".into()
        )]
    );
}
