//! SSE decoding for streamed completion responses.
//!
//! The upstream body looks like:
//! ```text
//! data: {"id":"...","choices":[{"delta":{"content":"text"}}]}
//!
//! data: [DONE]
//! ```
//! `data:` lines accumulate until a blank line dispatches them. Comment and
//! `event:` lines are ignored.

use bytes::Bytes;
use futures::{Stream, StreamExt};

use super::{CompletionChunk, ProviderError};

/// Result of decoding one dispatched SSE data payload.
#[derive(Debug, PartialEq)]
pub enum SsePayload {
    /// The `[DONE]` sentinel: the upstream stream is finished.
    Done,
    /// A completion unit.
    Chunk(CompletionChunk),
}

/// Incremental line decoder. Bytes may be split anywhere, including inside
/// a multi-byte UTF-8 sequence.
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes not yet terminated by a newline.
    pending: Vec<u8>,
    /// Prefix of `pending` already known to hold no newline.
    scanned: usize,
    /// Data lines of the event being assembled.
    data: String,
    has_data: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning the data payloads of every completed event.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<String>, ProviderError> {
        self.pending.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(offset) = self.pending[self.scanned..]
            .iter()
            .position(|&b| b == b'\n')
        {
            let pos = self.scanned + offset;
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            self.scanned = 0;
            let line = decode_line(&raw)?;
            if let Some(data) = self.process_line(line) {
                events.push(data);
            }
        }
        self.scanned = self.pending.len();
        Ok(events)
    }

    /// Flush a trailing event that was not followed by a blank line.
    pub fn finish(&mut self) -> Result<Option<String>, ProviderError> {
        if !self.pending.is_empty() {
            let raw = std::mem::take(&mut self.pending);
            self.scanned = 0;
            let line = decode_line(&raw)?;
            if let Some(data) = self.process_line(line) {
                return Ok(Some(data));
            }
        }
        Ok(self.dispatch())
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }

        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            if self.has_data {
                self.data.push('\n');
            }
            self.data.push_str(value);
            self.has_data = true;
        }

        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        Some(std::mem::take(&mut self.data))
    }
}

fn decode_line(raw: &[u8]) -> Result<&str, ProviderError> {
    let line = std::str::from_utf8(raw)
        .map_err(|e| ProviderError::Malformed(format!("invalid UTF-8 in stream: {e}")))?;
    Ok(line.trim_end_matches(['\n', '\r']))
}

/// Decode one data payload into a chunk, the sentinel, or an error.
pub fn decode_payload(data: &str) -> Result<SsePayload, ProviderError> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SsePayload::Done);
    }
    if data.is_empty() {
        return Ok(SsePayload::Chunk(CompletionChunk::default()));
    }

    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| ProviderError::Malformed(format!("{e}: {data}")))?;

    if let Some(error) = value.get("error") {
        return Err(ProviderError::Upstream(error_message(error)));
    }

    serde_json::from_value(value)
        .map(SsePayload::Chunk)
        .map_err(|e| ProviderError::Malformed(e.to_string()))
}

/// Human-readable message of an OpenAI-style `error` object.
pub(crate) fn error_message(error: &serde_json::Value) -> String {
    error
        .get("message")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| error.to_string())
}

/// Turn a response byte stream into completion chunks.
///
/// The stream ends at `[DONE]`, at end of body, or right after the first error.
pub fn chunk_stream<S, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<CompletionChunk, ProviderError>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<ProviderError> + Send + 'static,
{
    async_stream::stream! {
        let mut decoder = SseDecoder::new();
        let mut byte_stream = std::pin::pin!(byte_stream);

        while let Some(next) = byte_stream.next().await {
            let bytes = match next {
                Ok(b) => b,
                Err(e) => {
                    let err: ProviderError = e.into();
                    yield Err(err);
                    return;
                }
            };

            let events = match decoder.feed(&bytes) {
                Ok(events) => events,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            for data in events {
                match decode_payload(&data) {
                    Ok(SsePayload::Done) => return,
                    Ok(SsePayload::Chunk(chunk)) => yield Ok(chunk),
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        match decoder.finish() {
            Ok(Some(data)) => match decode_payload(&data) {
                Ok(SsePayload::Done) => {}
                Ok(SsePayload::Chunk(chunk)) => yield Ok(chunk),
                Err(e) => yield Err(e),
            },
            Ok(None) => {}
            Err(e) => yield Err(e),
        }
    }
}
