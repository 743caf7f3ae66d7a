//! The editing session: one task that owns an [`Editor`], its completion
//! debounce and its autosave, and talks to the host over channels.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

use crate::auth::{AuthError, SessionCheck};
use crate::autosave::{
    DEFAULT_AUTOSAVE_INTERVAL, NoteSnapshot, SaveCoordinator, SaveRequest, SaveStatus,
};
use crate::completion::scheduler::DEFAULT_DEBOUNCE;
use crate::completion::{CompletionClient, CompletionError, DebounceScheduler};
use crate::editing::{Cmd, CursorMarker, Document, MarkupError};
use crate::editor::{Editor, Key, KeyOutcome};
use crate::overlay::{Suggestion, SuggestionState};
use crate::store::{Note, NoteId, NoteQuery, NoteStore, OwnerId, PersistenceError};

pub const NEW_NOTE_NAME: &str = "New Note";
pub const DEFAULT_MAX_TOKENS: u32 = 50;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("Stored note is not valid markup: {0}")]
    Markup(#[from] MarkupError),
    #[error("Note not found: {0}")]
    NotFound(NoteId),
    #[error("Editing session has ended")]
    Closed,
}

/// The services a session talks to
#[derive(Clone)]
pub struct SessionDeps {
    pub store: Arc<dyn NoteStore>,
    pub auth: Arc<dyn SessionCheck>,
    pub completion: CompletionClient,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub debounce: Duration,
    pub autosave_interval: Duration,
    pub max_tokens: u32,
    pub completion_enabled: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
            max_tokens: DEFAULT_MAX_TOKENS,
            completion_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Key(Key),
    Apply(Cmd),
    Rename(String),
    Shutdown,
}

/// What the host should redraw. Consecutive duplicates are not sent.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    DocumentChanged(Document),
    SaveStatus(SaveStatus),
    Suggestion(SuggestionState),
    /// The store assigned an id to a new note
    NoteCreated(NoteId),
}

/// What travels over the command channel
#[derive(Debug)]
enum Request {
    Command(SessionCommand),
    Flush(oneshot::Sender<SaveStatus>),
}

/// The host's end of a running session. Dropping it ends the session.
#[derive(Debug)]
pub struct SessionHandle {
    commands: UnboundedSender<Request>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands
            .send(Request::Command(command))
            .map_err(|_| SessionError::Closed)
    }

    /// Save unsaved changes now and wait until the store has them.
    ///
    /// Commands sent before the flush are applied first, so the last edit
    /// is never left behind. Resolves to [`SaveStatus::Saved`], or to
    /// [`SaveStatus::Dirty`] when the save failed.
    pub async fn flush(&self) -> Result<SaveStatus, SessionError> {
        let (reply, status) = oneshot::channel();
        self.commands
            .send(Request::Flush(reply))
            .map_err(|_| SessionError::Closed)?;
        status.await.map_err(|_| SessionError::Closed)
    }

    pub fn key(&self, key: Key) -> Result<(), SessionError> {
        self.send(SessionCommand::Key(key))
    }

    /// Stop the session and wait for it; in-flight requests are aborted
    pub async fn shutdown(self) {
        let _ = self.commands.send(Request::Command(SessionCommand::Shutdown));
        if let Err(error) = self.task.await {
            log::warn!("Editing session task failed: {error}");
        }
    }
}

struct CompletionDone {
    generation: u64,
    anchor: CursorMarker,
    result: Result<String, CompletionError>,
}

pub struct EditorSession {
    deps: SessionDeps,
    settings: SessionSettings,
    editor: Editor,
    name: String,
    scheduler: DebounceScheduler,
    saves: SaveCoordinator,
    completion_tasks: JoinSet<CompletionDone>,
    save_tasks: JoinSet<Result<Note, PersistenceError>>,
    events: UnboundedSender<SessionEvent>,
    last_status: Option<SaveStatus>,
    last_suggestion: SuggestionState,
    flushes: Vec<oneshot::Sender<SaveStatus>>,
}

impl EditorSession {
    /// Load `note_id` (or start a new note) and spawn the session task.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn open(
        deps: SessionDeps,
        settings: SessionSettings,
        note_id: Option<NoteId>,
    ) -> Result<(SessionHandle, UnboundedReceiver<SessionEvent>), SessionError> {
        let owner = deps.auth.check_session().await.owner()?.clone();

        let (name, document) = match &note_id {
            Some(id) => load_note(deps.store.as_ref(), &owner, id).await?,
            None => (NEW_NOTE_NAME.to_string(), Document::new()),
        };
        // Compare against canonical markup so merely opening a note never
        // looks like an edit
        let baseline = NoteSnapshot::new(name.clone(), document.markup());

        let (events, events_rx) = mpsc::unbounded_channel();
        let (commands, commands_rx) = mpsc::unbounded_channel();

        let mut session = Self {
            scheduler: DebounceScheduler::new(settings.debounce),
            saves: SaveCoordinator::new(note_id, baseline),
            deps,
            settings,
            editor: Editor::new(document),
            name,
            completion_tasks: JoinSet::new(),
            save_tasks: JoinSet::new(),
            events,
            last_status: None,
            last_suggestion: SuggestionState::None,
            flushes: Vec::new(),
        };
        session.emit(SessionEvent::DocumentChanged(session.editor.document().clone()));
        session.publish_status();

        let task = tokio::spawn(session.run(commands_rx));
        Ok((SessionHandle { commands, task }, events_rx))
    }

    async fn run(mut self, mut commands: UnboundedReceiver<Request>) {
        let start = Instant::now() + self.settings.autosave_interval;
        let mut autosave = tokio::time::interval_at(start, self.settings.autosave_interval);
        autosave.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let deadline = self.scheduler.deadline();

            tokio::select! {
                request = commands.recv() => match request {
                    Some(Request::Command(SessionCommand::Shutdown)) | None => break,
                    Some(Request::Command(command)) => self.handle_command(command),
                    Some(Request::Flush(reply)) => self.flush(reply),
                },
                _ = wait_until(deadline) => self.fire_completion(),
                _ = autosave.tick() => self.autosave(),
                Some(done) = self.completion_tasks.join_next(), if !self.completion_tasks.is_empty() => {
                    self.on_completion(done);
                }
                Some(saved) = self.save_tasks.join_next(), if !self.save_tasks.is_empty() => {
                    self.on_saved(saved);
                }
            }
        }

        log::debug!("Editing session closed");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Key(key) => {
                let outcome = self.editor.handle_key(key);
                self.after_edit(outcome);
            }
            SessionCommand::Apply(cmd) => match self.editor.apply(cmd) {
                Ok(outcome) => self.after_edit(outcome),
                Err(error) => log::warn!("Rejected edit: {error}"),
            },
            SessionCommand::Rename(name) => {
                self.name = name;
                self.publish_status();
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn after_edit(&mut self, outcome: KeyOutcome) {
        if outcome.text_changed {
            self.scheduler.on_edit(Instant::now());
        }
        if outcome.document_changed {
            self.emit(SessionEvent::DocumentChanged(self.editor.document().clone()));
        }
        self.publish_suggestion();
        self.publish_status();
    }

    fn fire_completion(&mut self) {
        let Some(generation) = self.scheduler.poll(Instant::now()) else {
            return;
        };

        let document = self.editor.document();
        if !self.settings.completion_enabled || document.is_blank() {
            self.scheduler.cancel();
            return;
        }

        let text = document.text();
        let offset = document.selection().end;
        let anchor = document.cursor();
        let client = self.deps.completion.clone();
        let max_tokens = self.settings.max_tokens;

        self.completion_tasks.spawn(async move {
            let result = client.request_completion(&text, offset, max_tokens).await;
            CompletionDone {
                generation,
                anchor,
                result,
            }
        });
    }

    fn on_completion(&mut self, joined: Result<CompletionDone, JoinError>) {
        let done = match joined {
            Ok(done) => done,
            Err(error) => {
                log::warn!("Completion task failed: {error}");
                return;
            }
        };
        if !self.scheduler.on_response(done.generation) {
            return;
        }

        match done.result {
            Ok(text) if text.is_empty() => {}
            Ok(text) => {
                self.editor.offer(Suggestion::new(text, done.anchor));
            }
            Err(error) => log::warn!("Completion failed: {error}"),
        }
        self.publish_suggestion();
    }

    fn live(&self) -> NoteSnapshot {
        NoteSnapshot::new(self.name.clone(), self.editor.document().markup())
    }

    fn autosave(&mut self) {
        let live = self.live();
        let Some(SaveRequest { id, snapshot }) = self.saves.tick(&live) else {
            return;
        };

        let store = self.deps.store.clone();
        let auth = self.deps.auth.clone();
        self.save_tasks.spawn(async move {
            let owner = auth.check_session().await.owner()?.clone();
            store
                .save_note(id.as_ref(), &owner, &snapshot.name, &snapshot.html)
                .await
        });
        self.publish_status();
    }

    fn flush(&mut self, reply: oneshot::Sender<SaveStatus>) {
        self.autosave();
        match self.saves.status(&self.live()) {
            SaveStatus::Saving => self.flushes.push(reply),
            status => {
                let _ = reply.send(status);
            }
        }
    }

    fn on_saved(&mut self, joined: Result<Result<Note, PersistenceError>, JoinError>) {
        let saved = match joined {
            Ok(Ok(note)) => {
                if let Some(id) = self.saves.on_saved(&note) {
                    self.emit(SessionEvent::NoteCreated(id));
                }
                true
            }
            Ok(Err(error)) => {
                log::warn!("Autosave failed: {error}");
                self.saves.on_failed();
                false
            }
            Err(error) => {
                log::warn!("Autosave task failed: {error}");
                self.saves.on_failed();
                false
            }
        };

        // A pending flush also covers edits made while this save ran
        if saved && !self.flushes.is_empty() {
            self.autosave();
        }
        let status = self.saves.status(&self.live());
        if status != SaveStatus::Saving {
            for reply in self.flushes.drain(..) {
                let _ = reply.send(status);
            }
        }
        self.publish_status();
    }

    fn publish_status(&mut self) {
        let status = self.saves.status(&self.live());
        if self.last_status != Some(status) {
            self.last_status = Some(status);
            self.emit(SessionEvent::SaveStatus(status));
        }
    }

    fn publish_suggestion(&mut self) {
        let state = self.editor.suggestion_state();
        if self.last_suggestion != state {
            self.last_suggestion = state.clone();
            self.emit(SessionEvent::Suggestion(state));
        }
    }

    fn emit(&self, event: SessionEvent) {
        // The host may stop listening before it drops the handle
        let _ = self.events.send(event);
    }
}

async fn load_note(
    store: &dyn NoteStore,
    owner: &OwnerId,
    id: &NoteId,
) -> Result<(String, Document), SessionError> {
    let page = store
        .find_notes(owner, &NoteQuery::by_ids(vec![id.clone()]))
        .await?;
    let note = page
        .items
        .into_iter()
        .find(|note| &note.id == id)
        .ok_or_else(|| SessionError::NotFound(id.clone()))?;
    let document = Document::from_markup(&note.html)?;
    Ok((note.name, document))
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
