//! Stream utilities for reactive data.
//!
//! Converts broadcast channels into async streams for snapshot delivery
//! and sync event notifications.

use std::pin::Pin;

use futures::Stream;
use tokio::sync::broadcast;
use tracing::warn;

/// Boxed stream type used across the crate.
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Convert a broadcast receiver into an async Stream.
///
/// This handles the `Lagged` error by continuing to receive
/// subsequent messages (older messages are lost).
pub fn broadcast_to_stream<T: Clone + Send + 'static>(
    mut rx: broadcast::Receiver<T>,
) -> BoxStream<T> {
    Box::pin(async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(item) => yield item,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Broadcast stream lagged, continuing with newer items");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Like [`broadcast_to_stream`], but yields `first` before anything received.
///
/// Subscribe to the channel *before* reading `first` so no update that
/// lands in between is lost.
pub fn broadcast_to_stream_with_initial<T: Clone + Send + 'static>(
    first: Option<T>,
    rx: broadcast::Receiver<T>,
) -> BoxStream<T> {
    let rest = broadcast_to_stream(rx);
    Box::pin(async_stream::stream! {
        if let Some(item) = first {
            yield item;
        }
        let mut rest = rest;
        while let Some(item) = futures::StreamExt::next(&mut rest).await {
            yield item;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_broadcast_to_stream() {
        let (tx, rx) = broadcast::channel::<i32>(16);

        let stream = broadcast_to_stream(rx);

        tx.send(1).unwrap();
        tx.send(2).unwrap();
        tx.send(3).unwrap();
        drop(tx);

        let items: Vec<_> = stream.collect().await;
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_initial_item_comes_first() {
        let (tx, rx) = broadcast::channel::<i32>(16);
        let stream = broadcast_to_stream_with_initial(Some(0), rx);

        tx.send(1).unwrap();
        drop(tx);

        let items: Vec<_> = stream.collect().await;
        assert_eq!(items, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_lagged_receiver_keeps_going() {
        let (tx, rx) = broadcast::channel::<i32>(2);
        let stream = broadcast_to_stream(rx);

        for i in 0..5 {
            tx.send(i).unwrap();
        }
        drop(tx);

        let items: Vec<_> = stream.collect().await;
        assert_eq!(items, vec![3, 4]);
    }
}
