//! Initial load gate.
//!
//! A new or empty document may never produce a snapshot, and a missing
//! document is not an error. The client becomes ready on the first snapshot
//! or when the timeout elapses, whichever happens first. Until then local
//! edits are not pushed, so an empty local document cannot clobber a
//! populated remote one.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Why the client became ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyReason {
    /// A snapshot arrived from the store.
    Snapshot,
    /// The timeout elapsed with no snapshot.
    Timeout,
}

impl fmt::Display for ReadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadyReason::Snapshot => write!(f, "snapshot"),
            ReadyReason::Timeout => write!(f, "timeout"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Loading { deadline: Instant },
    Ready(ReadyReason),
}

/// Fallback timer that marks the client ready.
#[derive(Debug)]
pub struct InitialLoadTimer {
    state: LoadState,
}

impl InitialLoadTimer {
    /// Start loading; the timer expires `timeout` after `now`.
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            state: LoadState::Loading {
                deadline: now + timeout,
            },
        }
    }

    /// Record a snapshot. Returns `true` if this made the client ready.
    pub fn on_snapshot(&mut self) -> bool {
        self.become_ready(ReadyReason::Snapshot)
    }

    /// Check the timeout. Returns `true` if this made the client ready.
    pub fn on_tick(&mut self, now: Instant) -> bool {
        match self.state {
            LoadState::Loading { deadline } if deadline <= now => {
                self.become_ready(ReadyReason::Timeout)
            }
            _ => false,
        }
    }

    /// Deadline of the fallback timer while still loading.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            LoadState::Loading { deadline } => Some(deadline),
            LoadState::Ready(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, LoadState::Ready(_))
    }

    /// Why the client became ready, if it has.
    pub fn reason(&self) -> Option<ReadyReason> {
        match self.state {
            LoadState::Ready(reason) => Some(reason),
            LoadState::Loading { .. } => None,
        }
    }

    fn become_ready(&mut self, reason: ReadyReason) -> bool {
        if self.is_ready() {
            return false;
        }
        self.state = LoadState::Ready(reason);
        true
    }
}
