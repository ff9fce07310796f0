//! SSE framing for the caller-facing edge of the gateway.
//!
//! Canonical stream events are re-encoded as `data:` frames whose payload
//! is a JSON object, followed by one literal `data: [DONE]` frame. The
//! sentinel payload is deliberately not JSON; consumers match it before
//! parsing.

use crate::types::{StreamEvent, TextStream};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};

/// Encode a canonical delta stream as caller-facing SSE frames.
///
/// Each delta becomes `data: {"text":...}\n\n` with the fragment JSON
/// encoded, so newlines and quotes inside a delta cannot break framing.
/// The terminal sentinel becomes `data: [DONE]\n\n`. A failure becomes a
/// final `data: {"error":...}\n\n` frame with no sentinel after it, so
/// callers can tell truncation from completion.
pub fn encode(stream: TextStream) -> impl Stream<Item = Bytes> + Send {
    stream.map(|event| match event {
        Ok(StreamEvent::Delta { text }) => frame(serde_json::json!({ "text": text })),
        Ok(StreamEvent::Done) => Bytes::from_static(b"data: [DONE]\n\n"),
        Err(e) => frame(serde_json::json!({ "error": e.to_string() })),
    })
}

fn frame(payload: serde_json::Value) -> Bytes {
    Bytes::from(format!("data: {payload}\n\n"))
}
