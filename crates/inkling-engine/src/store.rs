//! Note records and the persistence seam.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthError;

pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// Store-assigned note identifier (a UUID string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is a canonical UUID, as every store-assigned id is
    pub fn is_uuid(&self) -> bool {
        Uuid::parse_str(&self.0).is_ok_and(|uuid| uuid.to_string() == self.0)
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account that owns notes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub owner: OwnerId,
    pub name: String,
    pub html: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteQuery {
    /// Restrict to these ids; empty means all of the owner's notes
    pub ids: Vec<NoteId>,
    /// 1-based
    pub page: usize,
    pub limit: usize,
}

impl Default for NoteQuery {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl NoteQuery {
    pub fn by_ids(ids: Vec<NoteId>) -> Self {
        Self {
            ids,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotePage {
    pub items: Vec<Note>,
    pub total_pages: usize,
    pub current_page: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Note not found or you do not have permission to edit it: {0}")]
    NotFound(NoteId),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Document database seam. All operations are scoped to one owner.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// The owner's notes, newest `modified` first, one page at a time
    async fn find_notes(
        &self,
        owner: &OwnerId,
        query: &NoteQuery,
    ) -> Result<NotePage, PersistenceError>;

    /// Create a note (`id` is `None`, the store assigns a fresh UUID) or
    /// update one of the owner's notes. Returns the stored record.
    async fn save_note(
        &self,
        id: Option<&NoteId>,
        owner: &OwnerId,
        name: &str,
        html: &str,
    ) -> Result<Note, PersistenceError>;
}

/// Filter, sort and page `notes` for `owner`
pub(crate) fn paginate(
    notes: impl IntoIterator<Item = Note>,
    owner: &OwnerId,
    query: &NoteQuery,
) -> Result<NotePage, PersistenceError> {
    if query.limit == 0 {
        return Err(PersistenceError::InvalidQuery(
            "limit must be at least 1".to_string(),
        ));
    }
    if query.page == 0 {
        return Err(PersistenceError::InvalidQuery(
            "pages start at 1".to_string(),
        ));
    }

    let mut matching: Vec<Note> = notes
        .into_iter()
        .filter(|note| &note.owner == owner)
        .filter(|note| query.ids.is_empty() || query.ids.contains(&note.id))
        .collect();
    matching.sort_by(|a, b| b.modified.cmp(&a.modified));

    let total_pages = matching.len().div_ceil(query.limit);
    let items = matching
        .into_iter()
        .skip((query.page - 1) * query.limit)
        .take(query.limit)
        .collect();

    Ok(NotePage {
        items,
        total_pages,
        current_page: query.page,
    })
}

/// Build the record for a save: a fresh note, or `existing` with new
/// content and a bumped `modified`
pub(crate) fn upsert(existing: Option<Note>, owner: &OwnerId, name: &str, html: &str) -> Note {
    let now = Utc::now();
    match existing {
        Some(note) => Note {
            name: name.to_string(),
            html: html.to_string(),
            modified: now.max(note.modified),
            ..note
        },
        None => Note {
            id: NoteId::generate(),
            owner: owner.clone(),
            name: name.to_string(),
            html: html.to_string(),
            created: now,
            modified: now,
        },
    }
}

/// Notes kept in process memory
#[derive(Debug, Default)]
pub struct MemoryNoteStore {
    notes: Mutex<HashMap<NoteId, Note>>,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<NoteId, Note>> {
        self.notes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn find_notes(
        &self,
        owner: &OwnerId,
        query: &NoteQuery,
    ) -> Result<NotePage, PersistenceError> {
        let notes: Vec<Note> = self.lock().values().cloned().collect();
        paginate(notes, owner, query)
    }

    async fn save_note(
        &self,
        id: Option<&NoteId>,
        owner: &OwnerId,
        name: &str,
        html: &str,
    ) -> Result<Note, PersistenceError> {
        let mut notes = self.lock();
        let existing = match id {
            Some(id) => match notes.get(id) {
                Some(note) if &note.owner == owner => Some(note.clone()),
                _ => return Err(PersistenceError::NotFound(id.clone())),
            },
            None => None,
        };
        let note = upsert(existing, owner, name, html);
        notes.insert(note.id.clone(), note.clone());
        Ok(note)
    }
}
