//! Merge engine: reconcile the last-seen remote document with local state.
//!
//! There is no authoritative server, so merging is conservative. Records are
//! never dropped unless a reset removes them from the merge base, while
//! concurrent edits of the *same* entity converge to whichever client synced
//! that entity last.
//!
//! | field                                   | policy                               |
//! |-----------------------------------------|--------------------------------------|
//! | `predictions` (by player), `notes` (by id) | keyed union, local wins on collision |
//! | `scores`                                | shallow overlay, local wins per key  |
//! | `team_names`, `categories`, lock flag   | local replaces wholesale             |

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use crate::document::SyncedDocument;

/// A record with a unique key inside a keyed collection.
pub trait Keyed {
    type Key: Eq + Hash + Clone;

    fn key(&self) -> Self::Key;
}

/// Merge two keyed lists.
///
/// The result holds every key from either side exactly once. Order is
/// first-seen: remote keys in remote order, then local-only keys in local
/// order. On collision the local record wins; a key repeated within one side
/// keeps its first position and its last value.
pub fn merge_keyed<T: Keyed + Clone>(remote: &[T], local: &[T]) -> Vec<T> {
    let mut merged: Vec<T> = Vec::with_capacity(remote.len() + local.len());
    let mut index: HashMap<T::Key, usize> = HashMap::with_capacity(remote.len() + local.len());

    for item in remote.iter().chain(local) {
        match index.get(&item.key()) {
            Some(&pos) => merged[pos] = item.clone(),
            None => {
                index.insert(item.key(), merged.len());
                merged.push(item.clone());
            }
        }
    }

    merged
}

/// Shallow overlay of a flat map: local values win, remote-only keys are kept.
pub fn merge_scores(
    remote: &BTreeMap<String, i64>,
    local: &BTreeMap<String, i64>,
) -> BTreeMap<String, i64> {
    let mut merged = remote.clone();
    merged.extend(local.iter().map(|(k, v)| (k.clone(), *v)));
    merged
}

/// Compute the document to push, given the merge base and local state.
///
/// Pure and deterministic.
pub fn merge(remote_base: &SyncedDocument, local: &SyncedDocument) -> SyncedDocument {
    SyncedDocument {
        predictions: merge_keyed(&remote_base.predictions, &local.predictions),
        scores: merge_scores(&remote_base.scores, &local.scores),
        notes: merge_keyed(&remote_base.notes, &local.notes),
        // Singleton settings: last local writer replaces the whole value.
        team_names: local.team_names.clone(),
        categories: local.categories.clone(),
        predictions_locked: local.predictions_locked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Category, CategoryKind, Note, Prediction, TeamNames};
    use serde_json::{Map, json};

    fn prediction(player: &str, overtime: &str) -> Prediction {
        let mut answers = Map::new();
        answers.insert("overtime".into(), json!(overtime));
        Prediction::new(player, answers)
    }

    fn note(id: i64, text: &str) -> Note {
        Note {
            id,
            author: "Ana".into(),
            timestamp: Default::default(),
            text: text.into(),
            team: "seahawks".into(),
        }
    }

    fn sample() -> SyncedDocument {
        let mut doc = SyncedDocument::new();
        doc.predictions = vec![prediction("A", "No"), prediction("B", "Yes")];
        doc.scores = BTreeMap::from([("A".to_string(), 10), ("B".to_string(), 5)]);
        doc.notes = vec![note(1, "go!"), note(2, "boo")];
        doc.team_names = TeamNames::new("Seattle Seahawks", "New England Patriots");
        doc.categories = vec![Category::new("overtime", "Overtime?", CategoryKind::Radio, 5)];
        doc
    }

    #[test]
    fn test_merge_is_idempotent() {
        let doc = sample();
        assert_eq!(merge(&doc, &doc), doc);
        assert_eq!(merge(&SyncedDocument::new(), &SyncedDocument::new()), SyncedDocument::new());
    }

    #[test]
    fn test_new_player_scenario() {
        let mut remote = SyncedDocument::new();
        remote.predictions = vec![prediction("A", "No")];
        remote.scores.insert("A".into(), 10);

        let mut local = remote.clone();
        local.predictions.push(prediction("B", "Yes"));
        local.scores.insert("B".into(), 5);

        let merged = merge(&remote, &local);
        let players: Vec<_> = merged.predictions.iter().map(|p| p.player_name.as_str()).collect();
        assert_eq!(players, vec!["A", "B"]);
        assert_eq!(
            merged.scores,
            BTreeMap::from([("A".to_string(), 10), ("B".to_string(), 5)])
        );
    }

    #[test]
    fn test_note_edit_scenario() {
        let mut remote = SyncedDocument::new();
        remote.notes = vec![note(1, "go!")];

        let mut local = SyncedDocument::new();
        local.notes = vec![note(1, "go team!"), note(2, "boo")];

        let merged = merge(&remote, &local);
        assert_eq!(merged.notes.len(), 2);
        assert_eq!(merged.note(1).unwrap().text, "go team!");
        assert_eq!(merged.note(2).unwrap().text, "boo");
    }

    #[test]
    fn test_remote_only_records_survive() {
        let remote = sample();
        let local = SyncedDocument::new();

        let merged = merge(&remote, &local);
        assert_eq!(merged.predictions.len(), 2);
        assert_eq!(merged.notes.len(), 2);
        assert_eq!(merged.scores.len(), 2);
    }

    #[test]
    fn test_every_key_once_local_wins() {
        let remote = vec![note(1, "r1"), note(2, "r2"), note(3, "r3")];
        let local = vec![note(4, "l4"), note(2, "l2"), note(5, "l5")];

        let merged = merge_keyed(&remote, &local);
        let ids: Vec<_> = merged.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(merged[1].text, "l2");
        assert_eq!(merged[0].text, "r1");
    }

    #[test]
    fn test_singletons_local_wins_unconditionally() {
        let remote = sample();
        let mut local = SyncedDocument::new();
        local.team_names = TeamNames::new("Chiefs", "Eagles");
        local.predictions_locked = true;

        let merged = merge(&remote, &local);
        assert_eq!(merged.team_names, TeamNames::new("Chiefs", "Eagles"));
        assert!(merged.categories.is_empty());
        assert!(merged.predictions_locked);
    }

    #[test]
    fn test_scores_overlay() {
        let remote = BTreeMap::from([("A".to_string(), 10), ("C".to_string(), 3)]);
        let local = BTreeMap::from([("A".to_string(), 25), ("B".to_string(), 5)]);

        let merged = merge_scores(&remote, &local);
        assert_eq!(merged.get("A"), Some(&25));
        assert_eq!(merged.get("B"), Some(&5));
        assert_eq!(merged.get("C"), Some(&3));
    }
}
