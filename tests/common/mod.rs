//! Scripted completion provider shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use chat_relay::config::Config;
use chat_relay::provider::{
    ChunkStream, CompletionChunk, CompletionProvider, CompletionRequest, ProviderError,
};
use chat_relay::relay::{ChatMessage, StreamRelay};
use chat_relay::server::chat_api::AppState;

/// One scripted upstream delivery.
#[derive(Clone)]
pub enum Step {
    /// A unit whose first choice carries this content delta.
    Text(&'static str),
    /// An arbitrary unit.
    Unit(CompletionChunk),
    /// A mid-stream failure.
    Fail(&'static str),
}

/// Provider that replays a script and records every request it receives.
pub struct FakeProvider {
    steps: Vec<Step>,
    open_error: Option<&'static str>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeProvider {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps,
            open_error: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// A provider whose call fails before any unit is delivered.
    pub fn failing_open(message: &'static str) -> Arc<Self> {
        Arc::new(Self {
            steps: Vec::new(),
            open_error: Some(message),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> CompletionRequest {
        self.requests.lock().unwrap().last().cloned().expect("no request recorded")
    }
}

#[async_trait]
impl CompletionProvider for FakeProvider {
    async fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<ChunkStream, ProviderError> {
        self.requests.lock().unwrap().push(request);

        if let Some(message) = self.open_error {
            return Err(ProviderError::Upstream(message.to_string()));
        }

        let units: Vec<Result<CompletionChunk, ProviderError>> = self
            .steps
            .iter()
            .cloned()
            .map(|step| match step {
                Step::Text(text) => Ok(CompletionChunk::text(text)),
                Step::Unit(chunk) => Ok(chunk),
                Step::Fail(message) => Err(ProviderError::Upstream(message.to_string())),
            })
            .collect();

        Ok(stream::iter(units).boxed())
    }
}

pub fn user(content: &str) -> ChatMessage {
    serde_json::from_value(serde_json::json!({"role": "user", "content": content})).unwrap()
}

pub fn app_state(provider: Arc<FakeProvider>) -> Arc<AppState> {
    app_state_with_config(provider, Config::default())
}

pub fn app_state_with_config(provider: Arc<FakeProvider>, config: Config) -> Arc<AppState> {
    Arc::new(AppState::new(StreamRelay::new(provider), Arc::new(config)))
}
