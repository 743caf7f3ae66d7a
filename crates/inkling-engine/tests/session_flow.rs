//! End-to-end session behaviour on tokio's paused clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use inkling_engine::{
    CompletionClient, CompletionService, CursorMarker, DisabledService, EditorSession, Key,
    LocalSession, MemoryNoteStore, Note, NoteId, NotePage, NoteQuery, NoteStore, OwnerId,
    PersistenceError, SaveStatus, ServiceError, SessionCheck, SessionDeps, SessionEvent,
    SessionSettings, SuggestionState,
};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc::UnboundedReceiver;

/// Answers the n-th request with the n-th canned answer after `delay`
struct ScriptedService {
    answers: Vec<&'static str>,
    delay: Duration,
    requests: Mutex<Vec<String>>,
}

impl ScriptedService {
    fn new(answers: Vec<&'static str>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            answers,
            delay,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    async fn complete(&self, _: &str, user_text: &str, _: u32) -> Result<String, ServiceError> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(user_text.to_string());
            requests.len() - 1
        };
        tokio::time::sleep(self.delay).await;
        self.answers
            .get(index)
            .map(|answer| answer.to_string())
            .ok_or(ServiceError::NoChoices)
    }
}

/// Counts saves, optionally failing all of them
struct CountingStore {
    inner: MemoryNoteStore,
    saves: AtomicUsize,
    fail: bool,
}

impl CountingStore {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryNoteStore::new(),
            saves: AtomicUsize::new(0),
            fail,
        })
    }

    fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NoteStore for CountingStore {
    async fn find_notes(
        &self,
        owner: &OwnerId,
        query: &NoteQuery,
    ) -> Result<NotePage, PersistenceError> {
        self.inner.find_notes(owner, query).await
    }

    async fn save_note(
        &self,
        id: Option<&NoteId>,
        owner: &OwnerId,
        name: &str,
        html: &str,
    ) -> Result<Note, PersistenceError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PersistenceError::InvalidQuery("store offline".to_string()));
        }
        self.inner.save_note(id, owner, name, html).await
    }
}

fn owner() -> OwnerId {
    OwnerId::new("me")
}

fn deps(store: Arc<dyn NoteStore>, service: Arc<dyn CompletionService>) -> SessionDeps {
    let auth: Arc<dyn SessionCheck> = Arc::new(LocalSession::new(owner()));
    SessionDeps {
        store,
        auth: auth.clone(),
        completion: CompletionClient::new(service, auth),
    }
}

fn without_completion() -> SessionSettings {
    SessionSettings {
        completion_enabled: false,
        ..SessionSettings::default()
    }
}

async fn next_matching(
    events: &mut UnboundedReceiver<SessionEvent>,
    wanted: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    loop {
        match events.recv().await {
            Some(event) if wanted(&event) => return event,
            Some(_) => continue,
            None => panic!("session ended before the expected event"),
        }
    }
}

fn type_text(handle: &inkling_engine::SessionHandle, text: &str) {
    for c in text.chars() {
        handle.key(Key::Char(c)).unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn test_pause_completes_and_tab_accepts() {
    let service = ScriptedService::new(vec![" world"], Duration::ZERO);
    let store = Arc::new(MemoryNoteStore::new());
    let (handle, mut events) =
        EditorSession::open(deps(store, service.clone()), SessionSettings::default(), None)
            .await
            .unwrap();

    type_text(&handle, "hello");

    let shown = next_matching(&mut events, |event| {
        matches!(event, SessionEvent::Suggestion(SuggestionState::Shown { .. }))
    })
    .await;
    assert_eq!(
        shown,
        SessionEvent::Suggestion(SuggestionState::Shown {
            text: " world".to_string(),
            anchor: CursorMarker::new(vec![0], 5),
        })
    );
    assert_eq!(
        service.requests(),
        vec!["Text to complete: hello<cursor/>".to_string()]
    );

    handle.key(Key::Tab).unwrap();

    let SessionEvent::DocumentChanged(document) = next_matching(&mut events, |event| {
        matches!(event, SessionEvent::DocumentChanged(doc) if doc.text() == "hello world")
    })
    .await
    else {
        unreachable!()
    };
    assert_eq!(document.selection(), 11..11);
    assert_eq!(
        next_matching(&mut events, |event| matches!(event, SessionEvent::Suggestion(_))).await,
        SessionEvent::Suggestion(SuggestionState::None)
    );

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stale_completion_never_reaches_overlay() {
    let service = ScriptedService::new(vec![" one", " two"], Duration::from_millis(1000));
    let store = Arc::new(MemoryNoteStore::new());
    let (handle, mut events) =
        EditorSession::open(deps(store, service.clone()), SessionSettings::default(), None)
            .await
            .unwrap();

    type_text(&handle, "hello");
    // The first request fires at 500 ms and is still running when typing resumes
    tokio::time::sleep(Duration::from_millis(600)).await;
    type_text(&handle, "!");

    let shown = next_matching(&mut events, |event| {
        matches!(event, SessionEvent::Suggestion(SuggestionState::Shown { .. }))
    })
    .await;

    assert_eq!(
        shown,
        SessionEvent::Suggestion(SuggestionState::Shown {
            text: " two".to_string(),
            anchor: CursorMarker::new(vec![0], 6),
        })
    );
    assert_eq!(
        service.requests(),
        vec![
            "Text to complete: hello<cursor/>".to_string(),
            "Text to complete: hello!<cursor/>".to_string(),
        ]
    );

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_blank_document_never_requests() {
    let service = ScriptedService::new(vec!["unused"], Duration::ZERO);
    let store = Arc::new(MemoryNoteStore::new());
    let (handle, _events) =
        EditorSession::open(deps(store, service.clone()), SessionSettings::default(), None)
            .await
            .unwrap();

    type_text(&handle, "   ");
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(service.requests().is_empty());
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_new_note_keeps_assigned_id() {
    let store = Arc::new(MemoryNoteStore::new());
    let (handle, mut events) = EditorSession::open(
        deps(store.clone(), Arc::new(DisabledService)),
        without_completion(),
        None,
    )
    .await
    .unwrap();

    type_text(&handle, "a");
    let SessionEvent::NoteCreated(id) = next_matching(&mut events, |event| {
        matches!(event, SessionEvent::NoteCreated(_))
    })
    .await
    else {
        unreachable!()
    };
    next_matching(&mut events, |event| {
        event == &SessionEvent::SaveStatus(SaveStatus::Saved)
    })
    .await;

    type_text(&handle, "b");
    next_matching(&mut events, |event| {
        event == &SessionEvent::SaveStatus(SaveStatus::Saving)
    })
    .await;
    next_matching(&mut events, |event| {
        event == &SessionEvent::SaveStatus(SaveStatus::Saved)
    })
    .await;

    assert_eq!(store.len(), 1);
    let page = store
        .find_notes(&owner(), &NoteQuery::by_ids(vec![id.clone()]))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].name, "New Note");
    assert_eq!(page.items[0].html, "<p>ab</p>");

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_clean_note_is_never_saved() {
    let store = CountingStore::new(false);
    let note = store
        .inner
        .save_note(None, &owner(), "Loaded", "<p>hello</p>\n")
        .await
        .unwrap();

    let (handle, _events) = EditorSession::open(
        deps(store.clone(), Arc::new(DisabledService)),
        without_completion(),
        Some(note.id),
    )
    .await
    .unwrap();

    // Cursor movement is not an edit
    handle.key(Key::Home).unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(store.saves(), 0);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_saves_stay_dirty_and_retry() {
    let store = CountingStore::new(true);
    let (handle, mut events) = EditorSession::open(
        deps(store.clone(), Arc::new(DisabledService)),
        without_completion(),
        None,
    )
    .await
    .unwrap();

    type_text(&handle, "x");
    next_matching(&mut events, |event| {
        event == &SessionEvent::SaveStatus(SaveStatus::Saving)
    })
    .await;
    assert_eq!(
        next_matching(&mut events, |event| matches!(event, SessionEvent::SaveStatus(_))).await,
        SessionEvent::SaveStatus(SaveStatus::Dirty)
    );

    next_matching(&mut events, |event| {
        event == &SessionEvent::SaveStatus(SaveStatus::Saving)
    })
    .await;
    next_matching(&mut events, |event| {
        event == &SessionEvent::SaveStatus(SaveStatus::Dirty)
    })
    .await;
    assert_eq!(store.saves(), 2);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_work() {
    let service = ScriptedService::new(vec!["unused"], Duration::ZERO);
    let store = CountingStore::new(false);
    let (handle, _events) = EditorSession::open(
        deps(store.clone(), service.clone()),
        SessionSettings::default(),
        None,
    )
    .await
    .unwrap();

    type_text(&handle, "x");
    handle.shutdown().await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(store.saves(), 0);
    assert!(service.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_flush_saves_the_last_keystroke() {
    let store = CountingStore::new(false);
    let (handle, _events) = EditorSession::open(
        deps(store.clone(), Arc::new(DisabledService)),
        without_completion(),
        None,
    )
    .await
    .unwrap();

    type_text(&handle, "ab");
    assert_eq!(handle.flush().await.unwrap(), SaveStatus::Saved);

    let page = store
        .inner
        .find_notes(&owner(), &NoteQuery::default())
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].html, "<p>ab</p>");
    assert_eq!(store.saves(), 1);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_flush_of_clean_note_does_not_save() {
    let store = CountingStore::new(false);
    let (handle, _events) = EditorSession::open(
        deps(store.clone(), Arc::new(DisabledService)),
        without_completion(),
        None,
    )
    .await
    .unwrap();

    assert_eq!(handle.flush().await.unwrap(), SaveStatus::Saved);
    assert_eq!(store.saves(), 0);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_flush_reports_failed_save() {
    let store = CountingStore::new(true);
    let (handle, _events) = EditorSession::open(
        deps(store.clone(), Arc::new(DisabledService)),
        without_completion(),
        None,
    )
    .await
    .unwrap();

    type_text(&handle, "x");
    assert_eq!(handle.flush().await.unwrap(), SaveStatus::Dirty);
    assert_eq!(store.saves(), 1);

    handle.shutdown().await;
}
