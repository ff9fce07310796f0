//! Canonical streaming events and the delta stream returned by streaming
//! dispatch.

use crate::Error;
use futures_util::stream::Stream;
use futures_util::StreamExt;
use std::fmt;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// An event in a canonical generation stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// An incremental, non-overlapping text fragment. Consumers append
    /// deltas in arrival order to reconstruct the full text.
    Delta { text: String },
    /// Terminal sentinel. Emitted exactly once; no event follows it.
    Done,
}

/// One decoded vendor frame, before sentinel bookkeeping.
#[derive(Debug)]
pub(crate) enum DeltaFrame {
    /// A content fragment to forward.
    Text(String),
    /// The vendor's explicit end-of-stream marker.
    EndOfStream,
    /// A frame with nothing to forward (empty delta, skipped fragment).
    Ignored,
}

type FrameStream = Pin<Box<dyn Stream<Item = Result<DeltaFrame, Error>> + Send>>;

/// An ordered, finite stream of text deltas terminated by exactly one
/// `Done`. A transport failure surfaces as an `Err` item and terminates
/// the stream without a sentinel, so consumers can tell truncation from
/// completion. Dropping the stream closes the upstream connection.
pub struct TextStream {
    frames: Option<FrameStream>,
    done: bool,
}

impl TextStream {
    /// Wrap a raw frame stream, enforcing the sentinel contract.
    pub(crate) fn from_frames<S>(frames: S) -> Self
    where
        S: Stream<Item = Result<DeltaFrame, Error>> + Send + 'static,
    {
        Self {
            frames: Some(Box::pin(frames)),
            done: false,
        }
    }

    /// Consume the stream, concatenating deltas up to the sentinel.
    pub async fn collect_text(mut self) -> Result<String, Error> {
        let mut text = String::new();
        while let Some(event) = self.next().await {
            match event? {
                StreamEvent::Delta { text: delta } => text.push_str(&delta),
                StreamEvent::Done => break,
            }
        }
        Ok(text)
    }
}

impl fmt::Debug for TextStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextStream")
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl Stream for TextStream {
    type Item = Result<StreamEvent, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        loop {
            let frame = match self.frames.as_mut() {
                Some(frames) => ready!(frames.poll_next_unpin(cx)),
                None => None,
            };
            match frame {
                Some(Ok(DeltaFrame::Text(text))) => {
                    return Poll::Ready(Some(Ok(StreamEvent::Delta { text })));
                }
                Some(Ok(DeltaFrame::Ignored)) => continue,
                Some(Ok(DeltaFrame::EndOfStream)) | None => {
                    // Release the upstream connection before announcing
                    // completion; nothing may follow the sentinel.
                    self.frames = None;
                    self.done = true;
                    return Poll::Ready(Some(Ok(StreamEvent::Done)));
                }
                Some(Err(e)) => {
                    self.frames = None;
                    self.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
            }
        }
    }
}
