//! SyncedDocument - the shared state replicated through the remote store.
//!
//! The remote store holds one JSON document. Decoding is lenient and
//! field-by-field: a field of the wrong type falls back to its empty value
//! instead of rejecting the whole snapshot, and malformed records inside the
//! keyed lists are skipped.
//!
//! Display-only state such as the visual theme is deliberately not part of
//! this type, so it can never reach the store.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, SecondsFormat, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::SyncResult;
use crate::merge::{Keyed, merge_keyed};

/// Unique identifier for a note (creation time in milliseconds, kept monotonic).
pub type NoteId = i64;

/// Generate a new note ID.
///
/// IDs are based on the wall clock in milliseconds and never go backwards
/// within a process, even when two notes are created in the same millisecond.
pub fn generate_note_id() -> NoteId {
    static LAST: AtomicI64 = AtomicI64::new(0);

    let now = Utc::now().timestamp_millis();
    let mut last = LAST.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST.compare_exchange_weak(last, candidate, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return candidate,
            Err(actual) => last = actual,
        }
    }
}

/// One player's predictions.
///
/// Identified by `player_name`. The answer fields are open-ended because the
/// set of categories is itself shared, editable state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    /// Creation time in milliseconds.
    pub id: i64,
    /// Unique key of the record.
    pub player_name: String,
    /// When the record was (re)submitted.
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Answer fields, keyed by category key (plus composite fields such as
    /// `finalScoreTeam1`).
    #[serde(flatten)]
    pub answers: Map<String, Value>,
}

impl Prediction {
    /// Create a new prediction stamped with the current time.
    pub fn new(player_name: impl Into<String>, answers: Map<String, Value>) -> Self {
        let now = now_millis();
        Self {
            id: now.timestamp_millis(),
            player_name: player_name.into(),
            timestamp: now,
            answers,
        }
    }

    /// Get an answer as a display string, if present and non-empty.
    pub fn answer(&self, key: &str) -> Option<String> {
        match self.answers.get(key)? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let player_name = obj.get("playerName")?.as_str()?.to_string();

        let answers = obj
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "id" | "playerName" | "timestamp"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Some(Self {
            id: obj.get("id").and_then(as_integer).unwrap_or(0),
            player_name,
            timestamp: parse_timestamp(obj.get("timestamp")),
            answers,
        })
    }
}

impl Keyed for Prediction {
    type Key = String;

    fn key(&self) -> String {
        self.player_name.clone()
    }
}

/// A note on the shared board.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    /// Unique identifier for this note.
    pub id: NoteId,
    /// Who wrote the note.
    pub author: String,
    /// When the note was created.
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Editable body.
    pub text: String,
    /// Team the author was cheering for when the note was posted.
    pub team: String,
}

impl Note {
    /// Create a new note with a fresh ID.
    pub fn new(author: impl Into<String>, text: impl Into<String>, team: impl Into<String>) -> Self {
        Self {
            id: generate_note_id(),
            author: author.into(),
            timestamp: now_millis(),
            text: text.into(),
            team: team.into(),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let id = obj.get("id").and_then(as_integer)?;
        Some(Self {
            id,
            author: string_field(obj, "author"),
            timestamp: parse_timestamp(obj.get("timestamp")),
            text: string_field(obj, "text"),
            team: string_field(obj, "team"),
        })
    }
}

impl Keyed for Note {
    type Key = NoteId;

    fn key(&self) -> NoteId {
        self.id
    }
}

/// Names of the two teams playing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamNames {
    pub team1: String,
    pub team2: String,
}

impl TeamNames {
    pub fn new(team1: impl Into<String>, team2: impl Into<String>) -> Self {
        Self {
            team1: team1.into(),
            team2: team2.into(),
        }
    }

    fn from_value(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_object) {
            Some(obj) => Self {
                team1: string_field(obj, "team1"),
                team2: string_field(obj, "team2"),
            },
            None => Self::default(),
        }
    }
}

/// How a category's answer is entered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    #[default]
    Text,
    Radio,
    Score,
    Number,
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryKind::Text => write!(f, "text"),
            CategoryKind::Radio => write!(f, "radio"),
            CategoryKind::Score => write!(f, "score"),
            CategoryKind::Number => write!(f, "number"),
        }
    }
}

impl FromStr for CategoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(CategoryKind::Text),
            "radio" => Ok(CategoryKind::Radio),
            "score" => Ok(CategoryKind::Score),
            "number" => Ok(CategoryKind::Number),
            other => Err(format!("unknown category type: {other}")),
        }
    }
}

/// A scoreable prediction category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: CategoryKind,
    pub point_value: i64,
}

impl Category {
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        kind: CategoryKind,
        point_value: i64,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind,
            point_value,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let key = obj.get("key")?.as_str()?.to_string();
        Some(Self {
            key,
            label: string_field(obj, "label"),
            kind: obj
                .get("type")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            point_value: obj.get("pointValue").and_then(as_integer).unwrap_or(0),
        })
    }
}

/// The full shared document.
///
/// Each sub-collection has its own merge policy; see [`crate::merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedDocument {
    /// Player predictions, unique by player name.
    pub predictions: Vec<Prediction>,
    /// Point totals by player name.
    pub scores: BTreeMap<String, i64>,
    /// Board notes, unique by ID.
    pub notes: Vec<Note>,
    pub team_names: TeamNames,
    pub categories: Vec<Category>,
    pub predictions_locked: bool,
}

impl SyncedDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a remote JSON document.
    ///
    /// Never fails: every field is checked independently and replaced by its
    /// empty value when missing or of the wrong type.
    pub fn from_remote(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            warn!(kind = json_kind(value), "Remote document is not an object, treating as empty");
            return Self::default();
        };

        let predictions: Vec<Prediction> =
            decode_list(obj.get("predictions"), "predictions", Prediction::from_value);
        let notes: Vec<Note> = decode_list(obj.get("notes"), "notes", Note::from_value);

        let scores = match obj.get("scores") {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(player, points)| (player.clone(), as_integer(points).unwrap_or(0)))
                .collect(),
            Some(Value::Null) | None => BTreeMap::new(),
            Some(other) => {
                warn!(kind = json_kind(other), "Ignoring malformed scores field");
                BTreeMap::new()
            }
        };

        Self {
            predictions: merge_keyed(&predictions, &[]),
            scores,
            notes: merge_keyed(&notes, &[]),
            team_names: TeamNames::from_value(obj.get("teamNames")),
            categories: decode_list(obj.get("categories"), "categories", Category::from_value),
            predictions_locked: obj
                .get("predictionsLocked")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }

    /// Encode as the remote JSON shape.
    pub fn to_remote(&self) -> SyncResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Find a prediction by player name.
    pub fn prediction(&self, player_name: &str) -> Option<&Prediction> {
        self.predictions.iter().find(|p| p.player_name == player_name)
    }

    /// Find a prediction by player name (mutable).
    pub fn prediction_mut(&mut self, player_name: &str) -> Option<&mut Prediction> {
        self.predictions
            .iter_mut()
            .find(|p| p.player_name == player_name)
    }

    /// Replace a player's prediction, moving it to the end of the list.
    pub fn upsert_prediction(&mut self, prediction: Prediction) {
        self.predictions
            .retain(|p| p.player_name != prediction.player_name);
        self.predictions.push(prediction);
    }

    /// Find a note by ID.
    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    /// Find a note by ID (mutable).
    pub fn note_mut(&mut self, id: NoteId) -> Option<&mut Note> {
        self.notes.iter_mut().find(|n| n.id == id)
    }

    /// Clear predictions and scores, keeping notes and settings.
    pub fn clear_results(&mut self) {
        self.predictions.clear();
        self.scores.clear();
    }
}

impl<'de> Deserialize<'de> for SyncedDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_remote(&value))
    }
}

fn decode_list<T>(value: Option<&Value>, field: &str, decode: fn(&Value) -> Option<T>) -> Vec<T> {
    match value {
        Some(Value::Array(items)) => {
            let decoded: Vec<T> = items.iter().filter_map(decode).collect();
            if decoded.len() != items.len() {
                warn!(
                    field,
                    skipped = items.len() - decoded.len(),
                    "Skipped malformed records in remote document"
                );
            }
            decoded
        }
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            warn!(field, kind = json_kind(other), "Ignoring malformed list field");
            Vec::new()
        }
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Current time at the precision the wire format carries.
fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn parse_timestamp(value: Option<&Value>) -> DateTime<Utc> {
    match value {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default(),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_default(),
        _ => DateTime::default(),
    }
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_full_document() {
        let doc = SyncedDocument::from_remote(&json!({
            "predictions": [
                {"id": 1700000000000i64, "playerName": "Ana", "timestamp": "2026-02-08T23:00:00.000Z",
                 "firstTDTime": "12:30", "overtime": "No"}
            ],
            "scores": {"Ana": 15},
            "notes": [
                {"id": 5, "author": "Ben", "timestamp": "2026-02-08T23:05:00.000Z", "text": "go!", "team": "seahawks"}
            ],
            "teamNames": {"team1": "Seattle Seahawks", "team2": "New England Patriots"},
            "categories": [
                {"key": "overtime", "label": "Overtime?", "type": "radio", "pointValue": 5}
            ],
            "predictionsLocked": true
        }));

        assert_eq!(doc.predictions.len(), 1);
        let ana = doc.prediction("Ana").unwrap();
        assert_eq!(ana.id, 1700000000000);
        assert_eq!(ana.answer("firstTDTime").as_deref(), Some("12:30"));
        assert!(!ana.answers.contains_key("playerName"));
        assert_eq!(doc.scores.get("Ana"), Some(&15));
        assert_eq!(doc.note(5).unwrap().text, "go!");
        assert_eq!(doc.team_names.team2, "New England Patriots");
        assert_eq!(doc.categories[0].kind, CategoryKind::Radio);
        assert_eq!(doc.categories[0].point_value, 5);
        assert!(doc.predictions_locked);
    }

    #[test]
    fn test_malformed_fields_fall_back_per_field() {
        let doc = SyncedDocument::from_remote(&json!({
            "predictions": "not a list",
            "scores": {"Ana": "lots", "Ben": 7.0},
            "notes": [{"text": "no id"}, {"id": 2, "text": "kept"}],
            "teamNames": 42,
            "categories": [{"label": "no key"}, {"key": "x", "type": "slider"}],
            "predictionsLocked": "yes"
        }));

        assert!(doc.predictions.is_empty());
        assert_eq!(doc.scores.get("Ana"), Some(&0));
        assert_eq!(doc.scores.get("Ben"), Some(&7));
        assert_eq!(doc.notes.len(), 1);
        assert_eq!(doc.notes[0].id, 2);
        assert_eq!(doc.team_names, TeamNames::default());
        assert_eq!(doc.categories.len(), 1);
        assert_eq!(doc.categories[0].kind, CategoryKind::Text);
        assert!(!doc.predictions_locked);
    }

    #[test]
    fn test_non_object_document_is_empty() {
        assert_eq!(SyncedDocument::from_remote(&json!(null)), SyncedDocument::default());
        assert_eq!(SyncedDocument::from_remote(&json!([1, 2])), SyncedDocument::default());
    }

    #[test]
    fn test_theme_is_never_decoded_or_encoded() {
        let doc = SyncedDocument::from_remote(&json!({"theme": "patriots", "predictionsLocked": false}));
        let encoded = doc.to_remote().unwrap();
        assert!(encoded.get("theme").is_none());
    }

    #[test]
    fn test_encode_uses_remote_field_names() {
        let mut doc = SyncedDocument::new();
        let mut answers = Map::new();
        answers.insert("overtime".into(), json!("Yes"));
        doc.upsert_prediction(Prediction::new("Ana", answers));
        doc.scores.insert("Ana".into(), 10);
        doc.predictions_locked = true;

        let value = doc.to_remote().unwrap();
        assert_eq!(value["predictions"][0]["playerName"], "Ana");
        assert_eq!(value["predictions"][0]["overtime"], "Yes");
        assert!(value["predictions"][0]["timestamp"].as_str().unwrap().ends_with('Z'));
        assert_eq!(value["scores"]["Ana"], 10);
        assert_eq!(value["predictionsLocked"], true);
        assert!(value.get("teamNames").is_some());
    }

    #[test]
    fn test_duplicate_keys_in_remote_are_collapsed() {
        let doc = SyncedDocument::from_remote(&json!({
            "predictions": [
                {"playerName": "Ana", "overtime": "No"},
                {"playerName": "Ben"},
                {"playerName": "Ana", "overtime": "Yes"}
            ]
        }));
        assert_eq!(doc.predictions.len(), 2);
        assert_eq!(doc.predictions[0].player_name, "Ana");
        assert_eq!(doc.predictions[0].answer("overtime").as_deref(), Some("Yes"));
    }

    #[test]
    fn test_upsert_replaces_and_moves_to_end() {
        let mut doc = SyncedDocument::new();
        doc.upsert_prediction(Prediction::new("Ana", Map::new()));
        doc.upsert_prediction(Prediction::new("Ben", Map::new()));
        let mut answers = Map::new();
        answers.insert("overtime".into(), json!("Yes"));
        doc.upsert_prediction(Prediction::new("Ana", answers));

        assert_eq!(doc.predictions.len(), 2);
        assert_eq!(doc.predictions[0].player_name, "Ben");
        assert_eq!(doc.predictions[1].answer("overtime").as_deref(), Some("Yes"));
    }

    #[test]
    fn test_note_ids_are_monotonic() {
        let a = generate_note_id();
        let b = generate_note_id();
        let c = generate_note_id();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_deserialize_is_lenient() {
        let doc: SyncedDocument = serde_json::from_str(r#"{"scores": [1, 2, 3]}"#).unwrap();
        assert!(doc.scores.is_empty());
    }
}
