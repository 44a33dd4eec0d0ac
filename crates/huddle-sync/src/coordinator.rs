//! Debounced push scheduling.
//!
//! The coordinator observes every local state change. An eligible change
//! cancels whatever push is pending, computes `merge(base, local)` and
//! schedules it one debounce window later, so a burst of edits produces a
//! single write carrying the state after the last edit.
//!
//! The coordinator only decides *what* to push and *when*; the event loop in
//! [`crate::client`] owns the timer and performs the actual save.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::document::SyncedDocument;
use crate::merge::merge;
use crate::session::SyncSession;

/// A merged document waiting for its debounce deadline.
#[derive(Debug, Clone)]
pub struct PendingPush {
    /// The document to save.
    pub payload: SyncedDocument,
    /// When the push becomes due.
    pub deadline: Instant,
    /// Increases with every scheduled push.
    pub generation: u64,
}

/// What the coordinator did with an observed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDisposition {
    /// The change came from applying a remote snapshot.
    Suppressed,
    /// The client has no merge base yet; the change will be pushed once ready.
    Deferred,
    /// A push was scheduled.
    Scheduled {
        deadline: Instant,
        /// Whether an earlier pending push was discarded.
        replaced: bool,
    },
}

/// Coalesces local changes into debounced pushes.
#[derive(Debug)]
pub struct SyncCoordinator {
    debounce: Duration,
    pending: Option<PendingPush>,
    deferred: bool,
    /// Newest save that failed, until a later save succeeds.
    failed_save: Option<u64>,
    generation: u64,
    discarded: u64,
}

impl SyncCoordinator {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            pending: None,
            deferred: false,
            failed_save: None,
            generation: 0,
            discarded: 0,
        }
    }

    /// The debounce window.
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Observe a local state change.
    pub fn observe(
        &mut self,
        session: &SyncSession,
        ready: bool,
        local: &SyncedDocument,
        now: Instant,
    ) -> ChangeDisposition {
        if session.is_suppressed() {
            trace!("Change caused by remote apply, not scheduling a push");
            return ChangeDisposition::Suppressed;
        }
        if !ready {
            debug!("Change observed before initial load, deferring push");
            self.deferred = true;
            return ChangeDisposition::Deferred;
        }

        self.deferred = false;
        let replaced = self.pending.take().is_some();
        if replaced {
            self.discarded += 1;
        }

        self.generation += 1;
        let deadline = now + self.debounce;
        self.pending = Some(PendingPush {
            payload: merge(session.merge_base(), local),
            deadline,
            generation: self.generation,
        });

        trace!(generation = self.generation, replaced, "Push scheduled");
        ChangeDisposition::Scheduled { deadline, replaced }
    }

    /// Schedule a deferred change once the client becomes ready.
    ///
    /// Returns `None` if nothing was deferred.
    pub fn resume(
        &mut self,
        session: &SyncSession,
        local: &SyncedDocument,
        now: Instant,
    ) -> Option<ChangeDisposition> {
        if !self.deferred {
            return None;
        }
        Some(self.observe(session, true, local, now))
    }

    /// Re-merge the pending payload against a new merge base.
    ///
    /// Keeps the deadline. Returns `false` if nothing is pending.
    pub fn rebase(&mut self, session: &SyncSession, local: &SyncedDocument) -> bool {
        match self.pending.as_mut() {
            Some(pending) => {
                pending.payload = merge(session.merge_base(), local);
                true
            }
            None => false,
        }
    }

    /// Deadline of the pending push, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    /// Take the pending push if its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<PendingPush> {
        match &self.pending {
            Some(p) if p.deadline <= now => self.pending.take(),
            _ => None,
        }
    }

    /// Take the pending push regardless of its deadline.
    pub fn take_now(&mut self) -> Option<PendingPush> {
        self.pending.take()
    }

    /// Discard the pending push without sending it.
    pub fn cancel(&mut self) -> Option<PendingPush> {
        let cancelled = self.pending.take();
        if cancelled.is_some() {
            self.discarded += 1;
        }
        cancelled
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn has_deferred(&self) -> bool {
        self.deferred
    }

    /// Record a failed save. Local state keeps counting as unsynced until a
    /// later save succeeds, since every push carries all of local state.
    pub fn save_failed(&mut self, save_id: u64) {
        if self.failed_save.is_none_or(|failed| save_id > failed) {
            self.failed_save = Some(save_id);
        }
    }

    /// Record a successful save.
    pub fn save_succeeded(&mut self, save_id: u64) {
        if self.failed_save.is_some_and(|failed| save_id > failed) {
            debug!(save_id, "Edits from a failed save are now in the store");
            self.failed_save = None;
        }
    }

    /// Whether a failed save still has edits the store never received.
    pub fn has_failed_save(&self) -> bool {
        self.failed_save.is_some()
    }

    /// Whether local state holds edits the store has not received yet.
    pub fn has_unsynced(&self) -> bool {
        self.pending.is_some() || self.deferred || self.failed_save.is_some()
    }

    /// Number of scheduled pushes discarded before they ran.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}
