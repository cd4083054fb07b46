//! Stream relay: bridges one upstream streaming completion to one outbound frame stream.
//!
//! The produced stream is lazy: nothing is sent upstream until the consumer
//! polls it. It always ends with exactly one [`StreamFrame::Done`] or
//! [`StreamFrame::Error`]. Dropping it drops the upstream response body,
//! which closes the upstream connection.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::provider::{CompletionProvider, CompletionRequest, ProviderMessage, Role};

/// A chat message as sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Client-side identifier. Never forwarded upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// One unit of relay output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// An incremental, non-empty text fragment.
    Text(String),
    /// Terminal: the relay failed with this message.
    Error(String),
    /// Terminal: the upstream stream finished normally.
    Done,
}

impl StreamFrame {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamFrame::Error(_) | StreamFrame::Done)
    }
}

pub type FrameStream = BoxStream<'static, StreamFrame>;

/// Translate client messages into the provider's request shape, dropping `id`.
pub fn to_provider_messages(messages: &[ChatMessage]) -> Vec<ProviderMessage> {
    messages
        .iter()
        .map(|m| ProviderMessage {
            role: m.role,
            content: m.content.clone(),
        })
        .collect()
}

/// Relays chat requests to a [`CompletionProvider`].
#[derive(Clone)]
pub struct StreamRelay {
    provider: Arc<dyn CompletionProvider>,
}

impl StreamRelay {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Start a relay. Each call opens a new upstream stream once polled.
    pub fn relay(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
        max_tokens: u32,
    ) -> FrameStream {
        let provider = self.provider.clone();
        let request = CompletionRequest {
            messages: to_provider_messages(messages),
            temperature,
            max_tokens,
        };

        let frames = async_stream::stream! {
            let mut upstream = match provider.stream_completion(request).await {
                Ok(upstream) => upstream,
                Err(e) => {
                    error!(error = %e, "Error generating response");
                    yield StreamFrame::Error(e.to_string());
                    return;
                }
            };

            let mut fragments = 0usize;
            while let Some(unit) = upstream.next().await {
                match unit {
                    Ok(chunk) => {
                        if let Some(text) = chunk.text_delta() {
                            fragments += 1;
                            yield StreamFrame::Text(text.to_owned());
                        }
                    }
                    Err(e) => {
                        error!(error = %e, fragments, "Error generating response");
                        yield StreamFrame::Error(e.to_string());
                        return;
                    }
                }
            }

            debug!(fragments, "Upstream stream completed");
            yield StreamFrame::Done;
        };

        frames.boxed()
    }
}
