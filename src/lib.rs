//! chat-relay: streaming chat relay for LLM completion APIs.
//!
//! Accepts a conversation over HTTP, opens a streaming completion call
//! upstream and re-emits each text fragment as a Server-Sent Event,
//! ending with `[DONE]` or an in-band error event.

pub mod config;
pub mod provider;
pub mod relay;
pub mod server;
