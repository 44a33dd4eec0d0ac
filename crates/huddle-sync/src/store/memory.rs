//! In-process document store.
//!
//! Several clients can share one `Arc<MemoryStore>`. Every save is echoed to
//! all subscribers, including the writer, the same way a hosted document
//! service notifies listeners. Save history, injected failures and latency
//! make it suitable for exercising the sync engine.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use super::{RemoteStore, SnapshotStream};
use crate::error::{StoreError, StoreResult};
use crate::stream::broadcast_to_stream_with_initial;

/// A shared in-memory document with change notifications.
pub struct MemoryStore {
    document: Mutex<Option<Value>>,
    history: Mutex<Vec<Value>>,
    change_tx: broadcast::Sender<Value>,
    failures_remaining: AtomicUsize,
    fail_subscriptions: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl MemoryStore {
    /// Create a store with no document.
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(512);
        Self {
            document: Mutex::new(None),
            history: Mutex::new(Vec::new()),
            change_tx,
            failures_remaining: AtomicUsize::new(0),
            fail_subscriptions: AtomicBool::new(false),
            latency: Mutex::new(None),
        }
    }

    /// Create a store that already holds `document`.
    pub fn with_document(document: Value) -> Self {
        let store = Self::new();
        *store.document.lock() = Some(document);
        store
    }

    /// Current stored document.
    pub fn document(&self) -> Option<Value> {
        self.document.lock().clone()
    }

    /// Every document passed to a successful `save`, in order.
    pub fn saves(&self) -> Vec<Value> {
        self.history.lock().clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.history.lock().len()
    }

    /// The most recent successful save.
    pub fn last_save(&self) -> Option<Value> {
        self.history.lock().last().cloned()
    }

    /// Make the next `count` saves fail.
    pub fn fail_next_saves(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Make subscriptions fail (or succeed again).
    pub fn fail_subscriptions(&self, fail: bool) {
        self.fail_subscriptions.store(fail, Ordering::SeqCst);
    }

    /// Delay every save by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Write a document as some other party would, notifying subscribers
    /// without recording it in the save history.
    pub fn publish(&self, document: Value) {
        *self.document.lock() = Some(document.clone());
        let _ = self.change_tx.send(document);
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.change_tx.receiver_count()
    }

    fn take_injected_failure(&self) -> bool {
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn subscribe(&self) -> StoreResult<SnapshotStream> {
        if self.fail_subscriptions.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("subscription refused".to_string()));
        }
        let rx = self.change_tx.subscribe();
        let current = self.document();
        debug!(has_document = current.is_some(), "MemoryStore subscribe");
        Ok(broadcast_to_stream_with_initial(current, rx))
    }

    async fn save(&self, document: Value) -> StoreResult<()> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.take_injected_failure() {
            return Err(StoreError::Unavailable("injected save failure".to_string()));
        }

        *self.document.lock() = Some(document.clone());
        self.history.lock().push(document.clone());
        let _ = self.change_tx.send(document);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_subscribe_emits_current_document_first() {
        let store = MemoryStore::with_document(json!({"predictionsLocked": true}));
        let mut snapshots = store.subscribe().await.unwrap();

        let first = snapshots.next().await.unwrap();
        assert_eq!(first["predictionsLocked"], true);
    }

    #[tokio::test]
    async fn test_save_is_echoed_to_subscribers() {
        let store = MemoryStore::new();
        let mut snapshots = store.subscribe().await.unwrap();

        store.save(json!({"scores": {"A": 1}})).await.unwrap();

        let echoed = snapshots.next().await.unwrap();
        assert_eq!(echoed["scores"]["A"], 1);
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.document(), Some(json!({"scores": {"A": 1}})));
    }

    #[tokio::test]
    async fn test_empty_store_emits_nothing() {
        let store = MemoryStore::new();
        let mut snapshots = store.subscribe().await.unwrap();

        let next = tokio::time::timeout(Duration::from_millis(20), snapshots.next()).await;
        assert!(next.is_err());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryStore::new();
        store.fail_next_saves(1);

        tokio_test::assert_err!(store.save(json!({})).await);
        tokio_test::assert_ok!(store.save(json!({})).await);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_publish_does_not_count_as_save() {
        let store = MemoryStore::new();
        let mut snapshots = store.subscribe().await.unwrap();

        store.publish(json!({"notes": []}));
        assert!(snapshots.next().await.is_some());
        assert_eq!(store.save_count(), 0);
        assert!(store.document().is_some());
    }

    #[tokio::test]
    async fn test_subscription_failure() {
        let store = MemoryStore::new();
        store.fail_subscriptions(true);
        assert!(store.subscribe().await.is_err());

        store.fail_subscriptions(false);
        assert!(store.subscribe().await.is_ok());
    }
}
