//! Convenient imports for the party app layer.
//!
//! ```ignore
//! use huddle_party::prelude::*;
//! ```

pub use huddle_sync::prelude::*;

pub use crate::{
    // Extension traits on SyncClient
    PartyNotes, PartyPredictions, PartyScores, PartySettings,
    // Party struct
    Party,
    // Domain types
    LocalSettings, PartyError, Standing, Theme,
    // Limits
    MAX_PLAYERS,
};
