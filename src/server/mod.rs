//! HTTP server relaying chat completions as Server-Sent Events.
//!
//! - [`chat_api`]: Request types, error responses and route handlers
//! - [`streaming`]: SSE encoding of relay frames

pub mod chat_api;
pub mod streaming;
