//! Extension trait adding prediction methods to SyncClient.

use huddle_sync::{Prediction, SyncClient};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{PartyError, Result};

/// Fields owned by the record itself; answers may not overwrite them.
const RESERVED_FIELDS: [&str; 3] = ["id", "playerName", "timestamp"];

/// Most players a party holds. Players already in can always resubmit.
pub const MAX_PLAYERS: usize = 4;

/// Answer key recording which team the player was cheering for.
pub const SELECTED_TEAM_FIELD: &str = "selectedTeam";

fn without_reserved(mut fields: Map<String, Value>) -> Map<String, Value> {
    fields.retain(|key, _| !RESERVED_FIELDS.contains(&key.as_str()));
    fields
}

fn player_name(player: String) -> Result<String> {
    let trimmed = player.trim();
    if trimmed.is_empty() {
        return Err(PartyError::InvalidInput("player name is empty".to_string()));
    }
    Ok(trimmed.to_string())
}

/// Prediction management extension trait for SyncClient.
pub trait PartyPredictions {
    /// Submit a player's predictions, replacing any earlier submission.
    ///
    /// The record gets a fresh id and timestamp and moves to the end of the
    /// list. A player with no score yet starts at zero. New players are
    /// rejected once the party has [`MAX_PLAYERS`].
    async fn submit_prediction(
        &self,
        player: impl Into<String> + Send,
        answers: Map<String, Value>,
    ) -> Result<Prediction>;

    /// Overlay `fields` onto an existing player's answers.
    async fn update_prediction(
        &self,
        player: impl Into<String> + Send,
        fields: Map<String, Value>,
    ) -> Result<Prediction>;

    /// A player's current predictions.
    fn prediction(&self, player: &str) -> Option<Prediction>;

    /// Players in submission order.
    fn players(&self) -> Vec<String>;
}

impl PartyPredictions for SyncClient {
    async fn submit_prediction(
        &self,
        player: impl Into<String> + Send,
        answers: Map<String, Value>,
    ) -> Result<Prediction> {
        let player = player_name(player.into())?;
        let answers = without_reserved(answers);

        let (prediction, replaced) = self
            .transaction(move |doc| {
                if doc.predictions_locked {
                    return Err(PartyError::PredictionsLocked);
                }
                let replaced = doc.prediction(&player).is_some();
                if !replaced && doc.predictions.len() >= MAX_PLAYERS {
                    return Err(PartyError::PartyFull(MAX_PLAYERS));
                }
                let prediction = Prediction::new(player.clone(), answers);
                doc.upsert_prediction(prediction.clone());
                doc.scores.entry(player).or_insert(0);
                Ok((prediction, replaced))
            })
            .await??;

        info!(player = %prediction.player_name, replaced, "Prediction submitted");
        Ok(prediction)
    }

    async fn update_prediction(
        &self,
        player: impl Into<String> + Send,
        fields: Map<String, Value>,
    ) -> Result<Prediction> {
        let player = player_name(player.into())?;
        let fields = without_reserved(fields);
        debug!(player = %player, fields = fields.len(), "Updating prediction");

        self.transaction(move |doc| {
            if doc.predictions_locked {
                return Err(PartyError::PredictionsLocked);
            }
            let prediction = doc
                .prediction_mut(&player)
                .ok_or_else(|| PartyError::UnknownPlayer(player.clone()))?;
            prediction.answers.extend(fields);
            Ok(prediction.clone())
        })
        .await?
    }

    fn prediction(&self, player: &str) -> Option<Prediction> {
        self.snapshot().prediction(player.trim()).cloned()
    }

    fn players(&self) -> Vec<String> {
        self.snapshot()
            .predictions
            .into_iter()
            .map(|p| p.player_name)
            .collect()
    }
}
