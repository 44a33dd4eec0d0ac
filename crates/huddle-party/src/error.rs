//! Error types for party operations

use huddle_sync::{NoteId, SyncError};
use thiserror::Error;

/// Errors that can occur when editing the party document
#[derive(Debug, Error)]
pub enum PartyError {
    #[error("Predictions are locked")]
    PredictionsLocked,

    #[error("No predictions for player: {0}")]
    UnknownPlayer(String),

    #[error("Note not found: {0}")]
    UnknownNote(NoteId),

    #[error("Category not found: {0}")]
    UnknownCategory(String),

    #[error("Category already exists: {0}")]
    DuplicateCategory(String),

    #[error("Party is full ({0} players)")]
    PartyFull(usize),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Local settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Local settings serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Result type for party operations
pub type Result<T> = std::result::Result<T, PartyError>;
