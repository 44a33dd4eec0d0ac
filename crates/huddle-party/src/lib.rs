//! # Huddle Party
//!
//! App layer for a prediction party: players submit predictions, the host
//! awards points, everyone posts on a note board. All of it lives in one
//! shared document kept in sync by [`huddle_sync`].
//!
//! Party operations are extension traits on `SyncClient`, so any client
//! handle can use them. [`Party`] adds the state that never leaves this
//! device (the theme) and seeds default settings for a new party.
//!
//! ## Quick Start
//!
//! ```ignore
//! use huddle_party::prelude::*;
//!
//! let store = Arc::new(FileStore::new("party.json"));
//! let party = Party::join(store, SyncConfig::new("den")).await?;
//!
//! party.submit_prediction("Ana", answers).await?;
//! party.client().award_points("Ana", 10).await?;
//! for standing in party.client().leaderboard() {
//!     println!("{}. {} {}", standing.rank, standing.player_name, standing.score);
//! }
//! ```

pub mod error;
pub mod local;
pub mod notes;
pub mod party;
pub mod predictions;
pub mod scores;
pub mod settings;
pub mod theme;

pub mod prelude;

pub use error::{PartyError, Result};
pub use local::LocalSettings;
pub use party::Party;
pub use predictions::MAX_PLAYERS;
pub use scores::{Standing, leaderboard};
pub use settings::{default_categories, default_document, default_team_names, seed_defaults};
pub use theme::Theme;

// Re-export extension traits
pub use notes::PartyNotes;
pub use predictions::PartyPredictions;
pub use scores::PartyScores;
pub use settings::PartySettings;
