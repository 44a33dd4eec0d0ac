//! Scores and the leaderboard.

use huddle_sync::{SyncClient, SyncedDocument};
use serde::Serialize;
use tracing::info;

use crate::error::{PartyError, Result};

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    /// 1-based position.
    pub rank: usize,
    pub player_name: String,
    pub score: i64,
}

/// Rank every player who has submitted predictions.
///
/// Highest score first. Players with equal scores keep submission order.
pub fn leaderboard(doc: &SyncedDocument) -> Vec<Standing> {
    let mut players: Vec<(String, i64)> = doc
        .predictions
        .iter()
        .map(|p| {
            let score = doc.scores.get(&p.player_name).copied().unwrap_or(0);
            (p.player_name.clone(), score)
        })
        .collect();
    players.sort_by(|a, b| b.1.cmp(&a.1));

    players
        .into_iter()
        .enumerate()
        .map(|(i, (player_name, score))| Standing {
            rank: i + 1,
            player_name,
            score,
        })
        .collect()
}

/// Score management extension trait for SyncClient.
pub trait PartyScores {
    /// Add points to a player's total, returning the new total.
    async fn award_points(&self, player: impl Into<String> + Send, points: i64) -> Result<i64>;

    /// A player's total; zero if they have none.
    fn score_of(&self, player: &str) -> i64;

    fn leaderboard(&self) -> Vec<Standing>;
}

impl PartyScores for SyncClient {
    async fn award_points(&self, player: impl Into<String> + Send, points: i64) -> Result<i64> {
        if points <= 0 {
            return Err(PartyError::InvalidInput(format!(
                "points must be positive, got {points}"
            )));
        }
        let player = player.into().trim().to_string();

        let total = self
            .transaction(move |doc| {
                if doc.prediction(&player).is_none() {
                    return Err(PartyError::UnknownPlayer(player));
                }
                let total = doc.scores.entry(player.clone()).or_insert(0);
                *total = total.checked_add(points).ok_or_else(|| {
                    PartyError::InvalidInput(format!("score of '{player}' would overflow"))
                })?;
                Ok(*total)
            })
            .await??;

        info!(points, total, "Points awarded");
        Ok(total)
    }

    fn score_of(&self, player: &str) -> i64 {
        self.snapshot().scores.get(player).copied().unwrap_or(0)
    }

    fn leaderboard(&self) -> Vec<Standing> {
        leaderboard(&self.snapshot())
    }
}
