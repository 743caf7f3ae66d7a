pub mod auth;
pub mod autosave;
pub mod completion;
pub mod editing;
pub mod editor;
pub mod io;
pub mod overlay;
pub mod session;
pub mod store;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use auth::{AnonymousSession, AuthError, LocalSession, SessionCheck, SessionStatus};
pub use autosave::{NoteSnapshot, SaveCoordinator, SaveRequest, SaveStatus};
pub use completion::{
    CompletionClient, CompletionError, CompletionService, DebounceScheduler, DebounceState,
    DisabledService, OpenAiService, OpenAiSettings, ServiceError,
};
pub use editing::*;
pub use editor::{Editor, Key, KeyOutcome, Shortcut};
pub use io::{FsNoteStore, IoError};
pub use overlay::{Suggestion, SuggestionOverlay, SuggestionState};
pub use session::{
    EditorSession, SessionCommand, SessionDeps, SessionError, SessionEvent, SessionHandle,
    SessionSettings,
};
pub use store::{
    MemoryNoteStore, Note, NoteId, NoteQuery, NoteStore, NotePage, OwnerId, PersistenceError,
};
