//! Convenient imports for sync clients.
//!
//! ```ignore
//! use huddle_sync::prelude::*;
//! ```

pub use std::sync::Arc;

pub use crate::{
    // Client
    SyncClient, SyncConfig, SyncEvent, ReadyReason,
    // Document types
    Category, CategoryKind, Note, NoteId, Prediction, SyncedDocument, TeamNames,
    // Stores
    FileStore, MemoryStore, RemoteStore,
    // Errors
    StoreError, SyncError, SyncResult,
};
