//! Interval autosave: dirty detection by value and one save at a time.

use std::time::Duration;

use crate::store::{Note, NoteId};

pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(1);

/// The persisted shape of a note, compared by value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NoteSnapshot {
    pub name: String,
    pub html: String,
}

impl NoteSnapshot {
    pub fn new(name: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            html: html.into(),
        }
    }
}

impl From<&Note> for NoteSnapshot {
    fn from(note: &Note) -> Self {
        Self::new(note.name.clone(), note.html.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Saving,
    Saved,
    Dirty,
}

/// A save the owner should perform. `id` is `None` for a note the store has
/// not seen yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub id: Option<NoteId>,
    pub snapshot: NoteSnapshot,
}

#[derive(Debug, Clone)]
pub struct SaveCoordinator {
    note_id: Option<NoteId>,
    last_saved: NoteSnapshot,
    in_flight: bool,
}

impl SaveCoordinator {
    /// `last_saved` is what the store currently holds; for a new note that
    /// is the empty snapshot the editor starts from.
    pub fn new(note_id: Option<NoteId>, last_saved: NoteSnapshot) -> Self {
        Self {
            note_id,
            last_saved,
            in_flight: false,
        }
    }

    pub fn note_id(&self) -> Option<&NoteId> {
        self.note_id.as_ref()
    }

    pub fn last_saved(&self) -> &NoteSnapshot {
        &self.last_saved
    }

    pub fn is_dirty(&self, live: &NoteSnapshot) -> bool {
        live != &self.last_saved
    }

    pub fn status(&self, live: &NoteSnapshot) -> SaveStatus {
        if self.in_flight {
            SaveStatus::Saving
        } else if self.is_dirty(live) {
            SaveStatus::Dirty
        } else {
            SaveStatus::Saved
        }
    }

    /// Interval tick. Ticks while a save is outstanding are skipped, not
    /// queued.
    pub fn tick(&mut self, live: &NoteSnapshot) -> Option<SaveRequest> {
        if self.in_flight || !self.is_dirty(live) {
            return None;
        }
        self.in_flight = true;
        log::debug!(
            "Saving note {}",
            self.note_id.as_ref().map_or("(new)", NoteId::as_str)
        );
        Some(SaveRequest {
            id: self.note_id.clone(),
            snapshot: live.clone(),
        })
    }

    /// Record a successful save. Returns the id when the store assigned one
    /// the coordinator did not know yet.
    pub fn on_saved(&mut self, note: &Note) -> Option<NoteId> {
        self.in_flight = false;
        self.last_saved = NoteSnapshot::from(note);

        if self.note_id.as_ref() == Some(&note.id) {
            return None;
        }
        log::debug!("Store assigned note id {}", note.id);
        self.note_id = Some(note.id.clone());
        Some(note.id.clone())
    }

    /// A failed save leaves `last_saved` alone; the next dirty tick retries
    pub fn on_failed(&mut self) {
        self.in_flight = false;
    }
}
