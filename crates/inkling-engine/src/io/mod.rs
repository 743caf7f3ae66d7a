use crate::store::{Note, NoteId, NotePage, NoteQuery, NoteStore, OwnerId, PersistenceError};
use async_trait::async_trait;
use relative_path::{RelativePath, RelativePathBuf};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid notes directory: {0}")]
    InvalidNotesDir(String),
}

impl From<IoError> for PersistenceError {
    fn from(error: IoError) -> Self {
        match error {
            IoError::Io(error) => PersistenceError::Io(error),
            other => PersistenceError::Io(std::io::Error::other(other.to_string())),
        }
    }
}

const NOTE_EXTENSION: &str = "json";

/// Relative path of a note's record file. Only canonical UUID ids map to a
/// file, so an id can never address anything outside the notes directory.
pub fn note_path(id: &NoteId) -> Option<RelativePathBuf> {
    id.is_uuid()
        .then(|| RelativePathBuf::from(format!("{id}.{NOTE_EXTENSION}")))
}

/// Read a file relative to the notes directory
pub fn read_file(relative_path: &RelativePath, notes_root: &Path) -> Result<String, IoError> {
    let absolute_path = relative_path.to_path(notes_root);
    if !absolute_path.exists() {
        return Err(IoError::NotFound(absolute_path));
    }
    fs::read_to_string(&absolute_path).map_err(IoError::Io)
}

/// Write a file relative to the notes directory
pub fn write_file(
    relative_path: &RelativePath,
    notes_root: &Path,
    content: &str,
) -> Result<(), IoError> {
    let absolute_path = relative_path.to_path(notes_root);

    if let Some(parent) = absolute_path.parent() {
        fs::create_dir_all(parent).map_err(IoError::Io)?;
    }

    // Replace through a temp file so readers never see a partial record
    let temp_path = absolute_path.with_extension("tmp");
    fs::write(&temp_path, content).map_err(IoError::Io)?;
    fs::rename(&temp_path, &absolute_path).map_err(IoError::Io)
}

/// Read one note record
pub fn read_note(id: &NoteId, notes_root: &Path) -> Result<Note, PersistenceError> {
    let relative_path = note_path(id).ok_or_else(|| PersistenceError::NotFound(id.clone()))?;
    let content = match read_file(&relative_path, notes_root) {
        Ok(content) => content,
        Err(IoError::NotFound(_)) => return Err(PersistenceError::NotFound(id.clone())),
        Err(error) => return Err(error.into()),
    };
    Ok(serde_json::from_str(&content)?)
}

/// Write one note record, replacing any previous version
pub fn write_note(note: &Note, notes_root: &Path) -> Result<(), PersistenceError> {
    let relative_path =
        note_path(&note.id).ok_or_else(|| PersistenceError::NotFound(note.id.clone()))?;
    let content = serde_json::to_string_pretty(note)?;
    write_file(&relative_path, notes_root, &content)?;
    Ok(())
}

/// Load every note record in the notes directory. Files that aren't note
/// records are skipped.
pub fn scan_notes(notes_root: &Path) -> Result<Vec<Note>, PersistenceError> {
    validate_notes_dir(notes_root)?;

    let mut notes = Vec::new();
    for entry in fs::read_dir(notes_root)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != NOTE_EXTENSION) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let id = NoteId::new(stem);
        if !id.is_uuid() {
            continue;
        }
        match read_note(&id, notes_root) {
            Ok(note) => notes.push(note),
            Err(error) => log::warn!("Skipping unreadable note {}: {}", path.display(), error),
        }
    }
    Ok(notes)
}

pub fn validate_notes_dir(path: &Path) -> Result<(), IoError> {
    if !path.exists() || !path.is_dir() {
        return Err(IoError::InvalidNotesDir(
            "Directory does not exist".to_string(),
        ));
    }

    Ok(())
}

/// Notes stored as one pretty-printed JSON file per note, named
/// `<id>.json`, directly in the notes directory.
///
/// Blocking file access runs on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct FsNoteStore {
    root: PathBuf,
}

impl FsNoteStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, IoError> {
        let root = root.into();
        validate_notes_dir(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn blocking<T, F>(&self, task: F) -> Result<T, PersistenceError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, PersistenceError> + Send + 'static,
    {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || task(&root))
            .await
            .map_err(|error| PersistenceError::Io(std::io::Error::other(error)))?
    }
}

#[async_trait]
impl NoteStore for FsNoteStore {
    async fn find_notes(
        &self,
        owner: &OwnerId,
        query: &NoteQuery,
    ) -> Result<NotePage, PersistenceError> {
        let notes = self.blocking(scan_notes).await?;
        crate::store::paginate(notes, owner, query)
    }

    async fn save_note(
        &self,
        id: Option<&NoteId>,
        owner: &OwnerId,
        name: &str,
        html: &str,
    ) -> Result<Note, PersistenceError> {
        let id = id.cloned();
        let owner = owner.clone();
        let name = name.to_string();
        let html = html.to_string();

        self.blocking(move |root| {
            let existing = match &id {
                Some(id) => match read_note(id, root) {
                    Ok(note) if note.owner == owner => Some(note),
                    Ok(_) => return Err(PersistenceError::NotFound(id.clone())),
                    Err(error) => return Err(error),
                },
                None => None,
            };
            let note = crate::store::upsert(existing, &owner, &name, &html);
            write_note(&note, root)?;
            log::debug!("Saved note {} to {}", note.id, root.display());
            Ok(note)
        })
        .await
    }
}
