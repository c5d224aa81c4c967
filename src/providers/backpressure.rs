//! Streaming backpressure via bounded channels.
//!
//! Wraps a fragment stream in a bounded `tokio::sync::mpsc::channel` so the
//! HTTP reader blocks when the consumer (parser, UI) falls behind instead of
//! buffering the whole response in memory.

use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;

use crate::Result;

/// Default number of fragments buffered between producer and consumer.
pub const DEFAULT_STREAM_BUFFER: usize = 64;

/// Wrap a stream in a bounded channel for backpressure.
///
/// Spawns a producer task that reads from `inner` and sends items through a
/// bounded `mpsc` channel. When the channel is full, the producer waits for
/// the consumer. If the consumer drops the stream, the producer stops.
///
/// Requires a tokio runtime context.
pub fn bounded_stream<T: Send + 'static>(
    inner: Pin<Box<dyn Stream<Item = Result<T>> + Send>>,
    buffer_size: usize,
) -> Pin<Box<dyn Stream<Item = Result<T>> + Send>> {
    let (tx, rx) = tokio::sync::mpsc::channel(buffer_size.max(1));

    tokio::spawn(async move {
        let mut inner = inner;
        while let Some(item) = inner.next().await {
            if tx.send(item).await.is_err() {
                break; // receiver dropped
            }
        }
    });

    Box::pin(ReceiverStream::new(rx))
}
