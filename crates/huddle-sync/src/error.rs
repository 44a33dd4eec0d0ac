//! Error types for huddle-sync

use std::io;

use thiserror::Error;

/// Errors reported by a [`RemoteStore`](crate::store::RemoteStore)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Write rejected by store: {0}")]
    Rejected(String),

    #[error("Store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Store document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File watcher error: {0}")]
    Watcher(#[from] notify::Error),
}

/// Errors that can occur while synchronizing
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Remote store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Save failed: {0}")]
    SaveFailed(String),

    #[error("Local edit panicked and was rolled back")]
    EditPanicked,

    #[error("Client is not ready: no merge base has been established yet")]
    NotReady,

    #[error("Sync client has shut down")]
    Closed,
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
