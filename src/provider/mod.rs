//! Upstream completion providers.
//!
//! - [`openai`]: OpenAI Chat Completions client (streaming mode)
//! - [`sse`]: Server-Sent Events decoding of the upstream response body
//!
//! The relay only depends on [`CompletionProvider`], so tests can swap in a fake.

pub mod openai;
pub mod sse;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Provider error: {0}")]
    Upstream(String),

    #[error("Malformed stream unit: {0}")]
    Malformed(String),
}

/// Conversational role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in the shape the provider accepts: role and content only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderMessage {
    pub role: Role,
    pub content: String,
}

/// A streaming completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Messages in conversation order.
    pub messages: Vec<ProviderMessage>,

    /// Sampling temperature, passed through unvalidated.
    pub temperature: f64,

    /// Maximum tokens to generate, passed through unvalidated.
    pub max_tokens: u32,
}

/// One incremental unit of a streamed completion (OpenAI `chat.completion.chunk`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl CompletionChunk {
    /// A chunk carrying `text` as the first choice's content delta.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    role: None,
                    content: Some(text.into()),
                },
                finish_reason: None,
            }],
        }
    }

    /// Non-empty content delta of the first choice. Other choices are ignored.
    pub fn text_delta(&self) -> Option<&str> {
        self.choices
            .first()?
            .delta
            .content
            .as_deref()
            .filter(|text| !text.is_empty())
    }
}

/// Incremental units of one upstream call, in delivery order.
pub type ChunkStream = BoxStream<'static, Result<CompletionChunk, ProviderError>>;

/// A completion service that can stream its output.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Open a streaming completion call.
    ///
    /// Errors returned here happen before any unit was delivered; errors after
    /// that arrive as items of the returned stream.
    async fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<ChunkStream, ProviderError>;
}
