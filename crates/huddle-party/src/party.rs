//! Party: the app-layer entry point.
//!
//! Holds a [`SyncClient`] for the shared document plus the state that stays
//! on this device: the display theme.

use std::sync::Arc;

use huddle_sync::{NoteId, Prediction, RemoteStore, SyncClient, SyncConfig};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::Result;
use crate::local::LocalSettings;
use crate::notes::PartyNotes;
use crate::predictions::{PartyPredictions, SELECTED_TEAM_FIELD};
use crate::settings::{default_document, seed_defaults};
use crate::theme::Theme;

/// A prediction party on a shared document.
///
/// # Example
///
/// ```ignore
/// use huddle_party::prelude::*;
///
/// let store = Arc::new(FileStore::new("party.json"));
/// let party = Party::join(store, SyncConfig::new("kitchen")).await?;
///
/// party.submit_prediction("Ana", answers).await?;
/// party.client().award_points("Ana", 10).await?;
/// ```
pub struct Party {
    client: SyncClient,
    theme: watch::Sender<Theme>,
}

impl Party {
    /// Start a party client. Local state starts from the default settings.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(store: Arc<dyn RemoteStore>, config: SyncConfig) -> Result<Self> {
        let client = SyncClient::start_with(store, config, default_document())?;
        Ok(Self::from_client(client))
    }

    /// Start a party client, wait for the initial load, and fill in default
    /// settings if the shared document has none.
    pub async fn join(store: Arc<dyn RemoteStore>, config: SyncConfig) -> Result<Self> {
        let party = Self::start(store, config)?;
        let reason = party.client.wait_ready().await?;
        let seeded = party.client.transaction(seed_defaults).await?;
        info!(%reason, seeded, "Joined party");
        Ok(party)
    }

    /// Wrap an already running client.
    pub fn from_client(client: SyncClient) -> Self {
        let (theme, _) = watch::channel(Theme::default());
        Self { client, theme }
    }

    /// The underlying sync client, for the extension traits.
    pub fn client(&self) -> &SyncClient {
        &self.client
    }

    pub fn theme(&self) -> Theme {
        *self.theme.borrow()
    }

    /// Change the theme. Affects this client only.
    pub fn set_theme(&self, theme: Theme) {
        if self.theme.send_replace(theme) != theme {
            debug!(%theme, "Theme changed");
        }
    }

    /// Watch the theme, for rendering.
    pub fn watch_theme(&self) -> watch::Receiver<Theme> {
        self.theme.subscribe()
    }

    /// Settings to persist on this device.
    pub fn local_settings(&self) -> LocalSettings {
        LocalSettings {
            theme: self.theme(),
        }
    }

    /// Restore settings saved on this device.
    pub fn apply_local_settings(&self, settings: LocalSettings) {
        self.set_theme(settings.theme);
    }

    /// Submit predictions on behalf of a fan of the current theme's team.
    pub async fn submit_prediction(
        &self,
        player: impl Into<String> + Send,
        mut answers: Map<String, Value>,
    ) -> Result<Prediction> {
        answers.insert(
            SELECTED_TEAM_FIELD.to_string(),
            Value::String(self.theme().to_string()),
        );
        self.client.submit_prediction(player, answers).await
    }

    /// Post a note tagged with the current theme.
    pub async fn post_note(
        &self,
        author: impl Into<String> + Send,
        text: impl Into<String> + Send,
    ) -> Result<NoteId> {
        self.client.add_note(author, text, self.theme().as_str()).await
    }

    /// Clear every prediction and score, here and in the shared document.
    pub async fn reset_all(&self) -> Result<()> {
        self.client.reset().await?;
        Ok(())
    }

    /// Push pending edits and stop syncing.
    pub async fn leave(&self) -> Result<()> {
        self.client.shutdown().await?;
        Ok(())
    }
}
