//! Stream adapter for parsing SSE (Server-Sent Events) from byte chunks.

use crate::Error;
use futures_util::{Stream, StreamExt};
use memchr::memmem;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Upper bound on bytes held while waiting for an event to complete.
const MAX_BUFFER_SIZE: usize = 1_000_000;

/// A stream adapter that parses SSE `data:` payloads from a byte stream.
/// Maintains internal state to handle events split across chunks, so a
/// chunk boundary may fall anywhere, including inside a UTF-8 sequence.
pub struct SseStream<S> {
    /// The underlying byte stream
    inner: S,
    /// Buffer for incomplete raw bytes from previous chunks
    buffer: Vec<u8>,
    /// Parsed data payloads ready to be yielded
    events: VecDeque<String>,
}

impl<S> SseStream<S> {
    /// Create a new SSE stream from a byte stream.
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: Vec::new(),
            events: VecDeque::new(),
        }
    }

    /// Parse complete SSE events from the buffer.
    /// Adds parsed payloads directly to the internal event list.
    fn drain_buffer(&mut self) -> Result<(), Error> {
        // SSE event separator is "\n\n" (two consecutive newlines)
        let separator = b"\n\n";
        let finder = memmem::Finder::new(separator);
        let mut start = 0;

        while let Some(pos) = finder.find(&self.buffer[start..]) {
            let event_end = start + pos;
            let event_bytes = &self.buffer[start..event_end];

            // A complete event must be valid UTF-8; a multi-byte character
            // can only be split at a chunk boundary, never at an event
            // boundary, because the separator is ASCII.
            let event_text = std::str::from_utf8(event_bytes)
                .map_err(|e| Error::streaming(format!("invalid UTF-8 in event stream: {e}")))?;

            if let Some(data) = Self::parse_event(event_text) {
                self.events.push_back(data);
            }

            // Move past this event (including the separator)
            start = event_end + separator.len();
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        Ok(())
    }

    /// Extract the data payload from a single complete SSE event.
    /// Multiple `data:` lines join with a newline; comments and other
    /// fields (`event:`, `id:`, `retry:`) carry nothing we forward.
    fn parse_event(event_text: &str) -> Option<String> {
        let mut data_lines = Vec::new();

        for line in event_text.lines() {
            let line = line.trim_end();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            if let Some((field, value)) = line.split_once(':') {
                if field == "data" {
                    // Remove optional leading space after colon
                    data_lines.push(value.strip_prefix(' ').unwrap_or(value).to_string());
                }
            }
        }

        if data_lines.is_empty() {
            return None;
        }

        Some(data_lines.join("\n"))
    }
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Item = Result<String, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            // First, yield any already-parsed payloads (FIFO order)
            if let Some(data) = self.events.pop_front() {
                return Poll::Ready(Some(Ok(data)));
            }

            // No buffered events, poll the underlying stream for more data
            let chunk = match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    return Poll::Ready(Some(Err(Error::streaming(format!(
                        "transport failure: {}",
                        e.into()
                    )))));
                }
                None => {
                    // Stream ended - parse any leftover bytes as a final
                    // event, for servers that omit the trailing "\n\n".
                    if !self.buffer.is_empty() {
                        if let Ok(text) = std::str::from_utf8(&self.buffer) {
                            let text = text.trim();
                            if !text.is_empty() {
                                if let Some(data) = Self::parse_event(text) {
                                    self.buffer.clear();
                                    return Poll::Ready(Some(Ok(data)));
                                }
                            }
                        }
                        self.buffer.clear();
                    }
                    return Poll::Ready(None);
                }
            };

            // Append raw bytes to buffer
            self.buffer.extend_from_slice(&chunk);

            if self.buffer.len() > MAX_BUFFER_SIZE {
                self.buffer.clear();
                return Poll::Ready(Some(Err(Error::streaming(
                    "event stream buffer exceeded maximum size",
                ))));
            }

            // Parse any complete events and continue loop
            if let Err(e) = self.drain_buffer() {
                return Poll::Ready(Some(Err(e)));
            }
        }
    }
}
