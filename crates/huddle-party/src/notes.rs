//! Extension trait adding note board methods to SyncClient.

use huddle_sync::{Note, NoteId, SyncClient};
use tracing::info;

use crate::error::{PartyError, Result};

pub const MAX_AUTHOR_LEN: usize = 20;
pub const MAX_NOTE_LEN: usize = 100;

fn bounded(value: String, what: &str, max: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PartyError::InvalidInput(format!("{what} is empty")));
    }
    if trimmed.chars().count() > max {
        return Err(PartyError::InvalidInput(format!(
            "{what} is longer than {max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Note board extension trait for SyncClient.
pub trait PartyNotes {
    /// Post a note, returning its id.
    async fn add_note(
        &self,
        author: impl Into<String> + Send,
        text: impl Into<String> + Send,
        team: impl Into<String> + Send,
    ) -> Result<NoteId>;

    /// Replace a note's text.
    async fn update_note(&self, id: NoteId, text: impl Into<String> + Send) -> Result<()>;

    /// Notes, newest first.
    fn notes_by_recent(&self) -> Vec<Note>;
}

impl PartyNotes for SyncClient {
    async fn add_note(
        &self,
        author: impl Into<String> + Send,
        text: impl Into<String> + Send,
        team: impl Into<String> + Send,
    ) -> Result<NoteId> {
        let author = bounded(author.into(), "author", MAX_AUTHOR_LEN)?;
        let text = bounded(text.into(), "note", MAX_NOTE_LEN)?;

        let note = Note::new(author, text, team);
        let note_id = note.id;
        info!(note_id, author = %note.author, "Posting note");

        self.update(move |doc| doc.notes.push(note)).await?;
        Ok(note_id)
    }

    async fn update_note(&self, id: NoteId, text: impl Into<String> + Send) -> Result<()> {
        let text = bounded(text.into(), "note", MAX_NOTE_LEN)?;

        self.transaction(move |doc| {
            let note = doc.note_mut(id).ok_or(PartyError::UnknownNote(id))?;
            note.text = text;
            Ok(())
        })
        .await?
    }

    fn notes_by_recent(&self) -> Vec<Note> {
        let mut notes = self.snapshot().notes;
        notes.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded() {
        assert_eq!(bounded("  hi ".to_string(), "note", 5).unwrap(), "hi");
        assert!(bounded(" ".to_string(), "note", 5).is_err());
        assert!(bounded("toolong".to_string(), "note", 5).is_err());
        // Counted in characters, not bytes.
        assert!(bounded("🏈🏈🏈".to_string(), "note", 3).is_ok());
    }
}
