//! Stream adapter for decoding an incrementally transmitted top-level
//! JSON array into its element objects.
//!
//! Some vendors stream a single JSON array over the response body, one
//! element per generation step: `[{..}\n,\n{..}\n,\n{..}]`. Chunk
//! boundaries fall anywhere, so elements are recovered with a byte-wise
//! scanner that tracks brace depth and string state across chunks. The
//! surrounding brackets and the commas between elements carry nothing.

use crate::Error;
use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Upper bound on bytes held while waiting for an element to complete.
const MAX_BUFFER_SIZE: usize = 1_000_000;

/// A stream adapter that yields each complete top-level object of a
/// streamed JSON array as its own string.
pub struct JsonArrayStream<S> {
    /// The underlying byte stream
    inner: S,
    /// Buffer for incomplete raw bytes from previous chunks
    buffer: Vec<u8>,
    /// Complete elements ready to be yielded
    elements: VecDeque<String>,
    /// Where scanning resumes within `buffer`
    pos: usize,
    /// Brace depth; 0 means between elements
    depth: u32,
    /// Inside a JSON string, where braces are not structural
    in_string: bool,
    /// The previous byte was a backslash inside a string
    escaped: bool,
    /// Offset of the open element's `{`, if one is in progress
    start: Option<usize>,
}

impl<S> JsonArrayStream<S> {
    /// Create a new array stream from a byte stream.
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: Vec::new(),
            elements: VecDeque::new(),
            pos: 0,
            depth: 0,
            in_string: false,
            escaped: false,
            start: None,
        }
    }

    /// Scan newly buffered bytes, extracting any elements that completed.
    /// All structural characters are ASCII, so byte-wise scanning never
    /// misreads a byte inside a multi-byte UTF-8 sequence.
    fn drain_buffer(&mut self) -> Result<(), Error> {
        let mut i = self.pos;
        while i < self.buffer.len() {
            let byte = self.buffer[i];
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
            } else {
                match byte {
                    b'"' => self.in_string = true,
                    b'{' => {
                        if self.depth == 0 {
                            self.start = Some(i);
                        }
                        self.depth += 1;
                    }
                    b'}' => {
                        self.depth = self.depth.saturating_sub(1);
                        if self.depth == 0 {
                            if let Some(start) = self.start.take() {
                                let element = &self.buffer[start..=i];
                                let text = std::str::from_utf8(element).map_err(|e| {
                                    Error::streaming(format!(
                                        "invalid UTF-8 in stream element: {e}"
                                    ))
                                })?;
                                self.elements.push_back(text.to_string());
                            }
                        }
                    }
                    // Brackets, commas and whitespace between elements
                    _ => {}
                }
            }
            i += 1;
        }

        // Keep only the open element (if any); everything before it has
        // been extracted or is inter-element punctuation.
        let consumed = self.start.unwrap_or(i);
        if consumed > 0 {
            self.buffer.drain(..consumed);
            if let Some(start) = self.start.as_mut() {
                *start -= consumed;
            }
        }
        self.pos = self.buffer.len();

        Ok(())
    }
}

impl<S, E> Stream for JsonArrayStream<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Item = Result<String, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            // First, yield any already-extracted elements (FIFO order)
            if let Some(element) = self.elements.pop_front() {
                return Poll::Ready(Some(Ok(element)));
            }

            // No buffered elements, poll the underlying stream for more data
            let chunk = match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    return Poll::Ready(Some(Err(Error::streaming(format!(
                        "transport failure: {}",
                        e.into()
                    )))));
                }
                None => {
                    // An element left open at end of stream cannot be
                    // recovered; drop it rather than forward a fragment.
                    if self.start.is_some() {
                        tracing::warn!(
                            buffered = self.buffer.len(),
                            "stream ended mid-element; dropping incomplete fragment"
                        );
                        self.buffer.clear();
                        self.start = None;
                    }
                    return Poll::Ready(None);
                }
            };

            // Append raw bytes to buffer
            self.buffer.extend_from_slice(&chunk);

            if self.buffer.len() > MAX_BUFFER_SIZE {
                self.buffer.clear();
                return Poll::Ready(Some(Err(Error::streaming(
                    "stream element exceeded maximum buffered size",
                ))));
            }

            // Extract any complete elements and continue loop
            if let Err(e) = self.drain_buffer() {
                return Poll::Ready(Some(Err(e)));
            }
        }
    }
}
