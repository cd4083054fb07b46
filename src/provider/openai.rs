//! OpenAI Chat Completions client in streaming mode.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, warn};

use super::sse::{chunk_stream, error_message};
use super::{ChunkStream, CompletionProvider, CompletionRequest, ProviderError, ProviderMessage};
use crate::config::ProviderConfig;

/// Default model used when none is configured.
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Default OpenAI API base URL.
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Streaming client for `POST /v1/chat/completions`.
///
/// ```no_run
/// use chat_relay::provider::openai::OpenAiProvider;
///
/// let provider = OpenAiProvider::new()
///     .api_key("sk-...")
///     .model("gpt-4o-mini")
///     .base_url("http://localhost:9999");
/// ```
pub struct OpenAiProvider {
    /// API key. Without one the upstream rejects the call with 401.
    pub(crate) api_key: Option<String>,
    pub(crate) model: String,
    /// API base URL (override for testing or proxies).
    pub(crate) base_url: String,
    /// Sent as `OpenAI-Organization` when set.
    pub(crate) organization: Option<String>,
    client: reqwest::Client,
}

/// Request body on the wire.
#[derive(Debug, Serialize)]
struct StreamingChatBody<'a> {
    model: &'a str,
    messages: &'a [ProviderMessage],
    temperature: f64,
    max_tokens: u32,
    stream: bool,
}

impl Default for OpenAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiProvider {
    /// Create a client with the default model and base URL and no key.
    pub fn new() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            organization: None,
            client: reqwest::Client::new(),
        }
    }

    /// Build a client from the `provider` config section.
    pub fn from_config(config: &ProviderConfig) -> Self {
        let mut provider = Self::new()
            .model(config.model.clone())
            .base_url(config.base_url.clone());
        provider.api_key = config.api_key.clone();
        provider.organization = config.organization.clone();
        provider
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    /// Build the chat completions endpoint URL.
    pub(crate) fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<ChunkStream, ProviderError> {
        let body = StreamingChatBody {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: true,
        };

        debug!(
            url = %self.completions_url(),
            model = %self.model,
            messages = request.messages.len(),
            "Opening upstream stream"
        );

        let mut builder = self.client.post(self.completions_url()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        if let Some(org) = &self.organization {
            builder = builder.header("OpenAI-Organization", org);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v.get("error").map(error_message))
                .unwrap_or(text);
            warn!(status = status.as_u16(), "Upstream rejected completion request");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(chunk_stream(response.bytes_stream()).boxed())
    }
}
