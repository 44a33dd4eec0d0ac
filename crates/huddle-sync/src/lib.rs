//! # Huddle Sync
//!
//! Client-side replication of one shared JSON document through a remote
//! key-value store that has no merge logic of its own.
//!
//! Each client keeps a full local copy of the document. Local edits are
//! debounced, merged against the last snapshot seen from the store and
//! pushed as a whole document. Incoming snapshots are applied to local state
//! under loop suppression, so a client never writes back a change that it
//! just received.
//!
//! ## Pieces
//!
//! - [`SyncedDocument`]: the replicated state and its lenient JSON decoding
//! - [`merge`]: per-field merge policy (keyed union for lists, overlay for
//!   scores, local wins for singletons)
//! - [`SyncSession`]: merge base plus the two-phase remote apply
//! - [`SyncCoordinator`]: debounced push scheduling
//! - [`InitialLoadTimer`]: readiness gate before the first push
//! - [`RemoteStore`]: the store contract, with [`MemoryStore`] and
//!   [`FileStore`] implementations
//! - [`SyncClient`]: the event loop tying all of the above together
//!
//! ## Quick Start
//!
//! ```ignore
//! use huddle_sync::prelude::*;
//!
//! let store = Arc::new(FileStore::new("party.json"));
//! let client = SyncClient::start(store, SyncConfig::new("living-room"))?;
//! client.wait_ready().await?;
//!
//! client.update(|doc| {
//!     doc.scores.insert("Ana".to_string(), 10);
//! }).await?;
//! client.shutdown().await?;
//! ```

pub mod client;
pub mod config;
pub mod coordinator;
pub mod document;
pub mod error;
pub mod initial_load;
pub mod merge;
pub mod session;
pub mod store;
pub mod stream;

pub mod prelude;

pub use client::{SyncClient, SyncEvent};
pub use config::SyncConfig;
pub use coordinator::{ChangeDisposition, PendingPush, SyncCoordinator};
pub use document::{
    Category, CategoryKind, Note, NoteId, Prediction, SyncedDocument, TeamNames,
    generate_note_id,
};
pub use error::{StoreError, StoreResult, SyncError, SyncResult};
pub use initial_load::{InitialLoadTimer, ReadyReason};
pub use merge::{Keyed, merge, merge_keyed, merge_scores};
pub use session::{RemoteApply, SyncSession};
pub use store::{FileStore, MemoryStore, RemoteStore, SnapshotStream};
pub use stream::BoxStream;
