//! SyncClient - the per-client event loop and its handle.
//!
//! One spawned task owns all sync state for a client: the session (merge
//! base and suppression flag), the coordinator (pending push), the initial
//! load timer and the local document. It is the only place that state is
//! touched, so none of it needs locking. The loop waits on:
//!
//! - commands from [`SyncClient`] handles (local edits, reset, flush),
//! - snapshots from the store subscription,
//! - the pending push deadline,
//! - the initial load deadline,
//! - completion of saves, which run in their own tasks so a slow store
//!   never blocks the loop.
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(MemoryStore::new());
//! let client = SyncClient::start(store, SyncConfig::new("den"))?;
//! client.wait_ready().await?;
//!
//! client.update(|doc| {
//!     doc.scores.insert("Ana".into(), 10);
//! }).await?;
//!
//! let mut events = client.events();
//! while let Some(event) = events.next().await {
//!     if let SyncEvent::SaveFailed { error, .. } = event {
//!         eprintln!("not synced yet: {error}");
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{Instrument, debug, info, info_span, trace, warn};

use crate::config::SyncConfig;
use crate::coordinator::{ChangeDisposition, PendingPush, SyncCoordinator};
use crate::document::SyncedDocument;
use crate::error::{StoreResult, SyncError, SyncResult};
use crate::initial_load::{InitialLoadTimer, ReadyReason};
use crate::merge::merge;
use crate::session::SyncSession;
use crate::store::{RemoteStore, SnapshotStream};
use crate::stream::{BoxStream, broadcast_to_stream};

/// Notifications about sync progress, for display to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The client established (or gave up waiting for) its merge base.
    Ready(ReadyReason),
    /// A remote snapshot was applied to local state.
    RemoteApplied { seq: u64 },
    /// A push reached the store.
    Saved { save_id: u64 },
    /// A push failed. Not retried; the next local edit pushes again.
    SaveFailed { save_id: u64, error: String },
    /// Subscribing to the store failed; the client proceeds with no data.
    SubscriptionFailed { error: String },
    /// The store ended the subscription.
    SubscriptionClosed,
}

type EditFn = Box<dyn FnOnce(&mut SyncedDocument) + Send>;

enum Command {
    Edit {
        edit: EditFn,
        done: oneshot::Sender<SyncResult<()>>,
    },
    Reset(oneshot::Sender<SyncResult<()>>),
    Flush(oneshot::Sender<SyncResult<()>>),
    Shutdown(oneshot::Sender<()>),
}

struct SaveOutcome {
    save_id: u64,
    result: StoreResult<()>,
}

/// Handle to a running sync client.
///
/// Cheap to clone. The event loop stops when [`SyncClient::shutdown`] is
/// called or every handle is dropped; in the latter case a push still
/// waiting for its debounce deadline is discarded.
#[derive(Clone)]
pub struct SyncClient {
    name: Arc<str>,
    cmd_tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<SyncedDocument>,
    ready_rx: watch::Receiver<Option<ReadyReason>>,
    event_tx: broadcast::Sender<SyncEvent>,
}

impl SyncClient {
    /// Start a client with an empty local document.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(store: Arc<dyn RemoteStore>, config: SyncConfig) -> SyncResult<Self> {
        Self::start_with(store, config, SyncedDocument::default())
    }

    /// Start a client whose local document starts as `initial`.
    ///
    /// `initial` is only the local starting point (for example default
    /// settings); it is not pushed unless edited after the client is ready.
    pub fn start_with(
        store: Arc<dyn RemoteStore>,
        config: SyncConfig,
        initial: SyncedDocument,
    ) -> SyncResult<Self> {
        config.validate()?;

        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_channel_capacity);
        let (save_tx, save_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(initial.clone());
        let (ready_tx, ready_rx) = watch::channel(None);
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);

        let driver = Driver {
            store,
            session: SyncSession::new(),
            coordinator: SyncCoordinator::new(config.debounce()),
            initial_load: InitialLoadTimer::new(config.initial_load_timeout(), Instant::now()),
            local: initial,
            state_tx,
            ready_tx,
            event_tx: event_tx.clone(),
            save_tx,
            next_save_id: 1,
            last_save_id: None,
            in_flight: 0,
            flush_waiters: HashMap::new(),
            shutdown_ack: None,
        };

        let span = info_span!("sync_client", client = %config.client_name);
        tokio::spawn(driver.run(cmd_rx, save_rx).instrument(span));

        Ok(Self {
            name: Arc::from(config.client_name.as_str()),
            cmd_tx,
            state_rx,
            ready_rx,
            event_tx,
        })
    }

    /// The configured client name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply a local edit.
    ///
    /// Edits are applied in call order. Returns once the edit has been
    /// applied to local state; the push happens after the debounce window.
    pub async fn update<F>(&self, f: F) -> SyncResult<()>
    where
        F: FnOnce(&mut SyncedDocument) + Send + 'static,
    {
        self.transaction(f).await
    }

    /// Apply a local edit and return a value computed from it.
    ///
    /// An edit that leaves the document unchanged does not schedule a push.
    /// An edit that panics is rolled back and reported as
    /// [`SyncError::EditPanicked`]; the client keeps running.
    pub async fn transaction<F, R>(&self, f: F) -> SyncResult<R>
    where
        F: FnOnce(&mut SyncedDocument) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (value_tx, value_rx) = oneshot::channel();
        let (done, done_rx) = oneshot::channel();
        let edit: EditFn = Box::new(move |doc| {
            let _ = value_tx.send(f(doc));
        });
        self.send(Command::Edit { edit, done }).await?;
        done_rx.await.map_err(|_| SyncError::Closed)??;
        value_rx.await.map_err(|_| SyncError::Closed)
    }

    /// Current local state.
    pub fn snapshot(&self) -> SyncedDocument {
        self.state_rx.borrow().clone()
    }

    /// Watch local state, for rendering.
    pub fn watch(&self) -> watch::Receiver<SyncedDocument> {
        self.state_rx.clone()
    }

    /// Stream of sync events.
    pub fn events(&self) -> BoxStream<SyncEvent> {
        broadcast_to_stream(self.event_tx.subscribe())
    }

    /// Subscribe to sync events, returning a raw broadcast receiver.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.ready_rx.borrow().is_some()
    }

    /// Why the client became ready, if it has.
    pub fn ready_reason(&self) -> Option<ReadyReason> {
        *self.ready_rx.borrow()
    }

    /// Wait until the client has a merge base (or the load timeout elapsed).
    pub async fn wait_ready(&self) -> SyncResult<ReadyReason> {
        let mut rx = self.ready_rx.clone();
        let reason = *rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| SyncError::Closed)?;
        reason.ok_or(SyncError::Closed)
    }

    /// Clear predictions and scores, locally and in the merge base.
    ///
    /// Merging never deletes records, so a reset has to drop them from the
    /// merge base too. Fails with [`SyncError::NotReady`] before the initial
    /// load completes.
    pub async fn reset(&self) -> SyncResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Reset(tx)).await?;
        rx.await.map_err(|_| SyncError::Closed)?
    }

    /// Push any pending change now and wait for the store to accept it.
    pub async fn flush(&self) -> SyncResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush(tx)).await?;
        rx.await.map_err(|_| SyncError::Closed)?
    }

    /// Push any pending change, wait for outstanding saves, and stop.
    pub async fn shutdown(&self) -> SyncResult<()> {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Shutdown(tx)).await.is_err() {
            // Already stopped.
            return Ok(());
        }
        let _ = rx.await;
        Ok(())
    }

    async fn send(&self, cmd: Command) -> SyncResult<()> {
        self.cmd_tx.send(cmd).await.map_err(|_| SyncError::Closed)
    }
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("name", &self.name)
            .field("ready", &self.ready_reason())
            .finish()
    }
}

/// State owned by the event loop.
struct Driver {
    store: Arc<dyn RemoteStore>,
    session: SyncSession,
    coordinator: SyncCoordinator,
    initial_load: InitialLoadTimer,
    local: SyncedDocument,
    state_tx: watch::Sender<SyncedDocument>,
    ready_tx: watch::Sender<Option<ReadyReason>>,
    event_tx: broadcast::Sender<SyncEvent>,
    save_tx: mpsc::UnboundedSender<SaveOutcome>,
    next_save_id: u64,
    last_save_id: Option<u64>,
    in_flight: usize,
    flush_waiters: HashMap<u64, Vec<oneshot::Sender<SyncResult<()>>>>,
    shutdown_ack: Option<oneshot::Sender<()>>,
}

impl Driver {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut save_rx: mpsc::UnboundedReceiver<SaveOutcome>,
    ) {
        let mut snapshots = match self.store.subscribe().await {
            Ok(stream) => Some(stream),
            Err(e) => {
                // No data yet; the load timer still makes the client ready.
                warn!(error = %e, "Store subscription failed");
                self.emit(SyncEvent::SubscriptionFailed {
                    error: e.to_string(),
                });
                None
            }
        };
        debug!("Sync loop started");

        loop {
            let push_deadline = self.coordinator.deadline();
            let load_deadline = self.initial_load.deadline();

            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        if self.coordinator.cancel().is_some() {
                            debug!("All handles dropped, discarding pending push");
                        }
                        break;
                    }
                },
                snapshot = next_snapshot(&mut snapshots) => match snapshot {
                    Some(value) => self.apply_remote(value),
                    None => {
                        warn!("Store subscription ended");
                        snapshots = None;
                        self.emit(SyncEvent::SubscriptionClosed);
                    }
                },
                Some(outcome) = save_rx.recv() => self.on_save_complete(outcome),
                _ = sleep_until_some(push_deadline) => self.transmit_due(),
                _ = sleep_until_some(load_deadline) => self.on_load_tick(),
            }

            if self.shutdown_ack.is_some() && self.in_flight == 0 {
                break;
            }
        }

        drop(cmd_rx);
        if let Some(ack) = self.shutdown_ack.take() {
            let _ = ack.send(());
        }
        debug!("Sync loop stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Edit { edit, done } => {
                let before = self.local.clone();
                let local = &mut self.local;
                if panic::catch_unwind(AssertUnwindSafe(move || edit(local))).is_err() {
                    warn!("Local edit panicked, change rolled back");
                    self.local = before;
                    let _ = done.send(Err(SyncError::EditPanicked));
                    return;
                }
                if self.local != before {
                    self.publish_state();
                    self.observe_local_change();
                }
                let _ = done.send(Ok(()));
            }
            Command::Reset(reply) => {
                let _ = reply.send(self.reset());
            }
            Command::Flush(reply) => self.flush(reply),
            Command::Shutdown(ack) => {
                if self.initial_load.is_ready() {
                    self.transmit_now();
                }
                self.shutdown_ack = Some(ack);
            }
        }
    }

    /// Apply an incoming snapshot under loop suppression.
    fn apply_remote(&mut self, raw: Value) {
        let snapshot = SyncedDocument::from_remote(&raw);
        let became_ready = self.initial_load.on_snapshot();

        // Unsynced local work (including edits from a failed save) survives
        // the snapshot; otherwise the store's value is taken as is, so
        // removals by other clients show up here.
        let keep_local = self.coordinator.has_unsynced() || self.in_flight > 0;
        let next = if keep_local {
            merge(&snapshot, &self.local)
        } else {
            snapshot.clone()
        };

        let ticket = self.session.begin_remote_apply(snapshot);
        self.local = next;
        self.publish_state();
        let disposition = self.observe_local_change();
        debug_assert_eq!(disposition, ChangeDisposition::Suppressed);
        if keep_local {
            self.coordinator.rebase(&self.session, &self.local);
        }
        let seq = ticket.seq();
        self.session.finish_remote_apply(ticket);

        debug!(seq, keep_local, "Applied remote snapshot");
        self.emit(SyncEvent::RemoteApplied { seq });

        if became_ready {
            self.on_ready(ReadyReason::Snapshot);
        }
    }

    fn reset(&mut self) -> SyncResult<()> {
        if !self.initial_load.is_ready() {
            return Err(SyncError::NotReady);
        }
        self.local.clear_results();
        self.session.reset_collections();
        self.publish_state();
        self.observe_local_change();
        info!("Predictions and scores reset");
        Ok(())
    }

    fn flush(&mut self, reply: oneshot::Sender<SyncResult<()>>) {
        if !self.initial_load.is_ready() {
            let _ = reply.send(Err(SyncError::NotReady));
            return;
        }
        let waiting_on = match self.transmit_now() {
            Some(save_id) => Some(save_id),
            None if self.in_flight > 0 => self.last_save_id,
            None => None,
        };
        match waiting_on {
            Some(save_id) => self.flush_waiters.entry(save_id).or_default().push(reply),
            None => {
                let _ = reply.send(Ok(()));
            }
        }
    }

    fn observe_local_change(&mut self) -> ChangeDisposition {
        let disposition = self.coordinator.observe(
            &self.session,
            self.initial_load.is_ready(),
            &self.local,
            Instant::now(),
        );
        if let ChangeDisposition::Scheduled { replaced: true, .. } = disposition {
            trace!(
                discarded = self.coordinator.discarded(),
                "Newer edit replaced pending push"
            );
        }
        disposition
    }

    fn on_load_tick(&mut self) {
        if self.initial_load.on_tick(Instant::now()) {
            self.on_ready(ReadyReason::Timeout);
        }
    }

    fn on_ready(&mut self, reason: ReadyReason) {
        info!(%reason, has_base = self.session.has_base(), "Client ready");
        self.ready_tx.send_replace(Some(reason));
        self.emit(SyncEvent::Ready(reason));

        if let Some(disposition) =
            self.coordinator
                .resume(&self.session, &self.local, Instant::now())
        {
            debug!(?disposition, "Scheduling edits made before initial load");
        }
    }

    fn transmit_due(&mut self) {
        if let Some(push) = self.coordinator.take_due(Instant::now()) {
            self.transmit(push);
        }
    }

    fn transmit_now(&mut self) -> Option<u64> {
        let push = self.coordinator.take_now()?;
        self.transmit(push)
    }

    /// Hand a push to the store in its own task.
    fn transmit(&mut self, push: PendingPush) -> Option<u64> {
        let save_id = self.next_save_id;
        self.next_save_id += 1;

        let payload = match push.payload.to_remote() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(save_id, error = %e, "Failed to encode document, push dropped");
                self.emit(SyncEvent::SaveFailed {
                    save_id,
                    error: e.to_string(),
                });
                return None;
            }
        };

        debug!(save_id, generation = push.generation, "Pushing merged document");
        self.in_flight += 1;
        self.last_save_id = Some(save_id);

        let store = Arc::clone(&self.store);
        let done_tx = self.save_tx.clone();
        tokio::spawn(
            async move {
                let result = store.save(payload).await;
                let _ = done_tx.send(SaveOutcome { save_id, result });
            }
            .in_current_span(),
        );
        Some(save_id)
    }

    fn on_save_complete(&mut self, outcome: SaveOutcome) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let waiters = self
            .flush_waiters
            .remove(&outcome.save_id)
            .unwrap_or_default();

        match outcome.result {
            Ok(()) => {
                self.coordinator.save_succeeded(outcome.save_id);
                debug!(save_id = outcome.save_id, "Push saved");
                self.emit(SyncEvent::Saved {
                    save_id: outcome.save_id,
                });
                for waiter in waiters {
                    let _ = waiter.send(Ok(()));
                }
            }
            Err(e) => {
                self.coordinator.save_failed(outcome.save_id);
                warn!(save_id = outcome.save_id, error = %e, "Push failed, will retry on next edit");
                let error = e.to_string();
                self.emit(SyncEvent::SaveFailed {
                    save_id: outcome.save_id,
                    error: error.clone(),
                });
                for waiter in waiters {
                    let _ = waiter.send(Err(SyncError::SaveFailed(error.clone())));
                }
            }
        }
    }

    fn publish_state(&self) {
        self.state_tx.send_if_modified(|current| {
            if *current == self.local {
                false
            } else {
                *current = self.local.clone();
                true
            }
        });
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.event_tx.send(event);
    }
}

async fn next_snapshot(stream: &mut Option<SnapshotStream>) -> Option<Value> {
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
