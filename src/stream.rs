//! Streaming accumulation of model output into response snapshots.
//!
//! [`ResponseStream`] consumes a stream of text fragments and yields one
//! [`ResponseState`] per non-empty fragment. Each snapshot carries the full
//! text received so far and a parse of that text made from scratch, so a
//! consumer can render either the raw text or the structured value at any
//! point.
//!
//! The last snapshot is special in exactly one way: its text has trailing
//! whitespace stripped. To know which snapshot is last, the stream holds one
//! snapshot back until the next fragment (or the end of the source) arrives.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use futures_util::{Stream, StreamExt};
use pin_project_lite::pin_project;
use tracing::trace;

use crate::Result;
use crate::parser::OutputParser;
use crate::types::ResponseState;

/// A boxed stream of text fragments from a completion call.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

pin_project! {
    /// Lazy sequence of [`ResponseState`] snapshots over a fragment source.
    ///
    /// Finite and single-use: the stream ends when the source ends, or after
    /// yielding the first source error.
    pub struct ResponseStream<S> {
        #[pin]
        fragments: S,
        parser: Arc<dyn OutputParser>,
        depth_limit: usize,
        full_text: String,
        // A snapshot of `full_text` is owed to the consumer.
        pending: bool,
        done: bool,
    }
}

impl<S> ResponseStream<S>
where
    S: Stream<Item = Result<String>>,
{
    pub fn new(fragments: S, parser: Arc<dyn OutputParser>, depth_limit: usize) -> Self {
        Self {
            fragments,
            parser,
            depth_limit,
            full_text: String::new(),
            pending: false,
            done: false,
        }
    }

    /// Drain the stream and return the final snapshot.
    ///
    /// Returns `Ok(None)` when the source produced no text, and the first
    /// source error otherwise encountered.
    pub async fn last(self) -> Result<Option<ResponseState>> {
        let mut stream = std::pin::pin!(self);
        let mut last = None;
        while let Some(item) = stream.next().await {
            last = Some(item?);
        }
        Ok(last)
    }
}

fn snapshot(parser: &dyn OutputParser, depth_limit: usize, text: &str) -> ResponseState {
    ResponseState::new(text, parser.fit(text, depth_limit))
}

impl<S> Stream for ResponseStream<S>
where
    S: Stream<Item = Result<String>>,
{
    type Item = Result<ResponseState>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }

        loop {
            match ready!(this.fragments.as_mut().poll_next(cx)) {
                Some(Ok(fragment)) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    if *this.pending {
                        let state = snapshot(this.parser.as_ref(), *this.depth_limit, this.full_text);
                        this.full_text.push_str(&fragment);
                        return Poll::Ready(Some(Ok(state)));
                    }
                    this.full_text.push_str(&fragment);
                    *this.pending = true;
                }
                Some(Err(e)) => {
                    *this.done = true;
                    *this.pending = false;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    *this.done = true;
                    if !std::mem::take(this.pending) {
                        return Poll::Ready(None);
                    }
                    let text = this.full_text.trim_end();
                    trace!(bytes = text.len(), "response stream finished");
                    return Poll::Ready(Some(Ok(snapshot(
                        this.parser.as_ref(),
                        *this.depth_limit,
                        text,
                    ))));
                }
            }
        }
    }
}
