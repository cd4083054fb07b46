//! SSE (Server-Sent Events) encoding of relay frames.
//!
//! Each frame becomes one `data:` event:
//! - `Text` → `{"text": "..."}`
//! - `Error` → `{"error": "..."}`
//! - `Done` → the literal `[DONE]`

use axum::response::sse::Event;
use futures::stream::Stream;
use serde::Serialize;
use tokio_stream::StreamExt;

use crate::relay::StreamFrame;

/// JSON body of a non-terminal or error frame.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum FramePayload<'a> {
    Text(&'a str),
    Error(&'a str),
}

/// Sentinel written after the last fragment of a successful stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// The `data:` field for a frame.
pub fn frame_data(frame: &StreamFrame) -> String {
    let payload = match frame {
        StreamFrame::Text(text) => FramePayload::Text(text),
        StreamFrame::Error(message) => FramePayload::Error(message),
        StreamFrame::Done => return DONE_SENTINEL.to_string(),
    };
    // Serializing a map of one string cannot fail.
    serde_json::to_string(&payload).unwrap_or_default()
}

/// Convert a relay frame stream into an SSE event stream.
pub fn frames_to_sse_stream<S>(
    frames: S,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>>
where
    S: Stream<Item = StreamFrame>,
{
    frames.map(|frame| Ok(Event::default().data(frame_data(&frame))))
}
