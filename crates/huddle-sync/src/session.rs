//! Per-client sync session: merge base and loop suppression.
//!
//! Applying an incoming snapshot mutates local state, and local state
//! changes are what schedule pushes. Without suppression every notification
//! from the store would be written straight back to it. The session makes
//! the distinction explicit with a two-phase commit:
//!
//! 1. [`SyncSession::begin_remote_apply`] records the snapshot as the new
//!    merge base and raises the suppression flag.
//! 2. The caller applies the snapshot to local state, publishes it, and lets
//!    the coordinator observe the change (it sees the flag raised).
//! 3. [`SyncSession::finish_remote_apply`] lowers the flag.
//!
//! Step 3 must never happen inside step 1.

use tracing::trace;

use crate::document::SyncedDocument;

/// Ticket for an in-progress remote apply.
///
/// Hand it back to [`SyncSession::finish_remote_apply`] once the resulting
/// local change has been observed.
#[must_use = "the suppression flag stays raised until the ticket is finished"]
#[derive(Debug)]
pub struct RemoteApply {
    seq: u64,
}

impl RemoteApply {
    /// Sequence number of the snapshot this ticket belongs to.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Session state shared by the receive and send paths of one client.
#[derive(Debug, Default)]
pub struct SyncSession {
    /// Last snapshot observed from the store.
    base: Option<SyncedDocument>,
    /// Number of remote applies that have begun but not finished.
    applying: u32,
    /// Snapshots applied so far.
    seq: u64,
    empty: SyncedDocument,
}

impl SyncSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase one: record `snapshot` as the merge base and raise suppression.
    pub fn begin_remote_apply(&mut self, snapshot: SyncedDocument) -> RemoteApply {
        self.base = Some(snapshot);
        self.applying += 1;
        self.seq += 1;
        trace!(seq = self.seq, depth = self.applying, "Remote apply started");
        RemoteApply { seq: self.seq }
    }

    /// Phase two: lower suppression for a finished apply.
    pub fn finish_remote_apply(&mut self, ticket: RemoteApply) {
        self.applying = self.applying.saturating_sub(1);
        trace!(seq = ticket.seq, depth = self.applying, "Remote apply finished");
    }

    /// Whether local changes are currently caused by a remote apply.
    pub fn is_suppressed(&self) -> bool {
        self.applying > 0
    }

    /// Whether any snapshot has been observed yet.
    pub fn has_base(&self) -> bool {
        self.base.is_some()
    }

    /// The merge base; empty if nothing has been observed.
    pub fn merge_base(&self) -> &SyncedDocument {
        self.base.as_ref().unwrap_or(&self.empty)
    }

    /// Number of snapshots applied.
    pub fn snapshots_applied(&self) -> u64 {
        self.seq
    }

    /// Drop predictions and scores from the merge base.
    ///
    /// Part of a full reset: merging never deletes, so records must be removed
    /// from the base as well as from local state or the next push would bring
    /// them back.
    pub fn reset_collections(&mut self) {
        if let Some(base) = self.base.as_mut() {
            base.clear_results();
        }
    }
}
