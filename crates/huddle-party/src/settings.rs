//! Party settings: team names, categories and the predictions lock.
//!
//! Settings are singleton fields of the shared document, so concurrent
//! edits from two clients resolve to whichever client pushed last.

use huddle_sync::{Category, CategoryKind, SyncClient, SyncedDocument, TeamNames};
use tracing::info;

use crate::error::{PartyError, Result};

pub const DEFAULT_TEAM1: &str = "Seattle Seahawks";
pub const DEFAULT_TEAM2: &str = "New England Patriots";

/// Team names for a fresh party.
pub fn default_team_names() -> TeamNames {
    TeamNames::new(DEFAULT_TEAM1, DEFAULT_TEAM2)
}

/// Categories for a fresh party.
pub fn default_categories() -> Vec<Category> {
    use CategoryKind::{Number, Radio, Score, Text};

    [
        ("firstTDTime", "First TD Time", Text, 10),
        ("firstScoreTeam", "First Score Team", Radio, 5),
        ("finalScore", "Final Score", Score, 10),
        ("overtime", "Overtime?", Radio, 5),
        ("totalPoints", "Total Points", Number, 10),
        ("carCommercials", "Car Commercials", Number, 10),
        ("beerBrand", "Beer Brand Most Ads", Radio, 5),
        ("cryptoAd", "Crypto Ad?", Radio, 5),
        ("bestCommercial", "Best Commercial", Text, 15),
        ("weirdestCommercial", "Weirdest Commercial", Text, 15),
        ("openingSong", "Opening Song", Text, 10),
        ("closingSong", "Closing Song", Text, 10),
        ("totalSongs", "Total Songs", Number, 10),
        ("specialGuest", "Special Guest", Text, 10),
        ("costumeChanges", "Costume Changes", Number, 10),
        ("playBiggestHit", "Play Biggest Hit?", Radio, 5),
    ]
    .into_iter()
    .map(|(key, label, kind, points)| Category::new(key, label, kind, points))
    .collect()
}

/// A document holding only the default settings.
pub fn default_document() -> SyncedDocument {
    SyncedDocument {
        team_names: default_team_names(),
        categories: default_categories(),
        ..Default::default()
    }
}

/// Fill in default settings the document lacks. Returns `true` if anything changed.
pub fn seed_defaults(doc: &mut SyncedDocument) -> bool {
    let mut changed = false;
    if doc.team_names == TeamNames::default() {
        doc.team_names = default_team_names();
        changed = true;
    }
    if doc.categories.is_empty() {
        doc.categories = default_categories();
        changed = true;
    }
    changed
}

fn validate_category(category: &Category) -> Result<()> {
    if category.key.trim().is_empty() {
        return Err(PartyError::InvalidInput("category key is empty".to_string()));
    }
    if category.point_value < 0 {
        return Err(PartyError::InvalidInput(format!(
            "category '{}' has negative points",
            category.key
        )));
    }
    Ok(())
}

/// Settings management extension trait for SyncClient.
pub trait PartySettings {
    /// Rename both teams.
    async fn set_team_names(
        &self,
        team1: impl Into<String> + Send,
        team2: impl Into<String> + Send,
    ) -> Result<()>;

    /// Replace the whole category list.
    async fn set_categories(&self, categories: Vec<Category>) -> Result<()>;

    /// Append a category. Keys must be unique.
    async fn add_category(&self, category: Category) -> Result<()>;

    /// Remove a category by key, returning it.
    async fn remove_category(&self, key: &str) -> Result<Category>;

    /// Change how many points a category is worth.
    async fn set_category_points(&self, key: &str, points: i64) -> Result<()>;

    async fn set_predictions_locked(&self, locked: bool) -> Result<()>;

    /// Flip the lock, returning the new state.
    async fn toggle_predictions_lock(&self) -> Result<bool>;

    /// Current categories.
    fn categories(&self) -> Vec<Category>;
}

impl PartySettings for SyncClient {
    async fn set_team_names(
        &self,
        team1: impl Into<String> + Send,
        team2: impl Into<String> + Send,
    ) -> Result<()> {
        let names = TeamNames::new(team1.into().trim(), team2.into().trim());
        if names.team1.is_empty() || names.team2.is_empty() {
            return Err(PartyError::InvalidInput("team names must not be empty".to_string()));
        }

        info!(team1 = %names.team1, team2 = %names.team2, "Setting team names");
        self.update(move |doc| doc.team_names = names).await?;
        Ok(())
    }

    async fn set_categories(&self, categories: Vec<Category>) -> Result<()> {
        for (i, category) in categories.iter().enumerate() {
            validate_category(category)?;
            if categories[..i].iter().any(|c| c.key == category.key) {
                return Err(PartyError::DuplicateCategory(category.key.clone()));
            }
        }

        self.update(move |doc| doc.categories = categories).await?;
        Ok(())
    }

    async fn add_category(&self, category: Category) -> Result<()> {
        validate_category(&category)?;

        self.transaction(move |doc| {
            if doc.categories.iter().any(|c| c.key == category.key) {
                return Err(PartyError::DuplicateCategory(category.key));
            }
            doc.categories.push(category);
            Ok(())
        })
        .await?
    }

    async fn remove_category(&self, key: &str) -> Result<Category> {
        let key = key.to_string();
        self.transaction(move |doc| {
            let index = doc
                .categories
                .iter()
                .position(|c| c.key == key)
                .ok_or_else(|| PartyError::UnknownCategory(key.clone()))?;
            Ok(doc.categories.remove(index))
        })
        .await?
    }

    async fn set_category_points(&self, key: &str, points: i64) -> Result<()> {
        if points < 0 {
            return Err(PartyError::InvalidInput("points must not be negative".to_string()));
        }

        let key = key.to_string();
        self.transaction(move |doc| {
            let category = doc
                .categories
                .iter_mut()
                .find(|c| c.key == key)
                .ok_or_else(|| PartyError::UnknownCategory(key.clone()))?;
            category.point_value = points;
            Ok(())
        })
        .await?
    }

    async fn set_predictions_locked(&self, locked: bool) -> Result<()> {
        info!(locked, "Setting predictions lock");
        self.update(move |doc| doc.predictions_locked = locked).await?;
        Ok(())
    }

    async fn toggle_predictions_lock(&self) -> Result<bool> {
        let locked = self
            .transaction(|doc| {
                doc.predictions_locked = !doc.predictions_locked;
                doc.predictions_locked
            })
            .await?;
        info!(locked, "Toggled predictions lock");
        Ok(locked)
    }

    fn categories(&self) -> Vec<Category> {
        self.snapshot().categories
    }
}
