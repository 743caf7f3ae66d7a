use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use inkling_config::{CompletionConfig, Config};
use inkling_engine::{
    CompletionClient, CompletionService, DisabledService, Document, EditorSession, FsNoteStore,
    Key, LocalSession, Note, NoteId, NoteQuery, NoteStore, OpenAiService, OpenAiSettings,
    OwnerId, SaveStatus, SessionCheck, SessionCommand, SessionDeps, SessionEvent, SessionHandle,
    SessionSettings, Shortcut, SuggestionState, io,
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};
use std::{
    env,
    fs::OpenOptions,
    io::{Stdout, stdout},
    path::{Path, PathBuf},
    process,
    sync::Arc,
    time::Duration,
};
use tokio::{runtime::Runtime, sync::mpsc::UnboundedReceiver};

mod render;

const LOCAL_OWNER: &str = "local";
const NOTE_LIST_LIMIT: usize = 200;

/// An open note
struct EditorView {
    handle: SessionHandle,
    events: UnboundedReceiver<SessionEvent>,
    document: Document,
    suggestion: SuggestionState,
    status: SaveStatus,
    name: String,
    note_id: Option<NoteId>,
    /// Buffer for Ctrl+T renaming
    renaming: Option<String>,
}

impl EditorView {
    /// Apply pending session events. Returns whether anything changed.
    fn drain_events(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.events.try_recv() {
            changed = true;
            match event {
                SessionEvent::DocumentChanged(document) => self.document = document,
                SessionEvent::SaveStatus(status) => self.status = status,
                SessionEvent::Suggestion(state) => self.suggestion = state,
                SessionEvent::NoteCreated(id) => self.note_id = Some(id),
            }
        }
        changed
    }
}

enum Screen {
    Notes,
    Editor(Box<EditorView>),
}

struct App {
    runtime: Runtime,
    deps: SessionDeps,
    settings: SessionSettings,
    owner: OwnerId,
    notes: Vec<Note>,
    note_list_state: ListState,
    screen: Screen,
    message: Option<String>,
}

impl App {
    fn new(runtime: Runtime, config: &Config) -> Result<Self> {
        let store = FsNoteStore::new(&config.notes_path)?;
        let owner = OwnerId::new(LOCAL_OWNER);
        let auth: Arc<dyn SessionCheck> = Arc::new(LocalSession::new(owner.clone()));
        let service = completion_service(config);

        let deps = SessionDeps {
            store: Arc::new(store),
            auth: auth.clone(),
            completion: CompletionClient::new(service, auth),
        };
        let settings = session_settings(&config.completion, config.autosave.interval());

        let mut app = Self {
            runtime,
            deps,
            settings,
            owner,
            notes: Vec::new(),
            note_list_state: ListState::default(),
            screen: Screen::Notes,
            message: None,
        };
        app.refresh_notes();
        Ok(app)
    }

    fn refresh_notes(&mut self) {
        let query = NoteQuery {
            limit: NOTE_LIST_LIMIT,
            ..NoteQuery::default()
        };
        match self
            .runtime
            .block_on(self.deps.store.find_notes(&self.owner, &query))
        {
            Ok(page) => self.notes = page.items,
            Err(e) => self.message = Some(format!("Error listing notes: {e}")),
        }

        let selected = match self.note_list_state.selected() {
            _ if self.notes.is_empty() => None,
            Some(i) => Some(i.min(self.notes.len() - 1)),
            None => Some(0),
        };
        self.note_list_state.select(selected);
    }

    fn next_note(&mut self) {
        if self.notes.is_empty() {
            return;
        }
        let i = match self.note_list_state.selected() {
            Some(i) => (i + 1) % self.notes.len(),
            None => 0,
        };
        self.note_list_state.select(Some(i));
    }

    fn previous_note(&mut self) {
        if self.notes.is_empty() {
            return;
        }
        let i = match self.note_list_state.selected() {
            Some(0) | None => self.notes.len() - 1,
            Some(i) => i - 1,
        };
        self.note_list_state.select(Some(i));
    }

    fn open_selected(&mut self) {
        let id = self
            .note_list_state
            .selected()
            .and_then(|i| self.notes.get(i))
            .map(|note| note.id.clone());
        if id.is_some() {
            self.open(id);
        }
    }

    fn open(&mut self, note_id: Option<NoteId>) {
        let opened = self.runtime.block_on(EditorSession::open(
            self.deps.clone(),
            self.settings.clone(),
            note_id.clone(),
        ));
        let (handle, events) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                self.message = Some(format!("Error opening note: {e}"));
                return;
            }
        };

        let name = note_id
            .as_ref()
            .and_then(|id| self.notes.iter().find(|note| &note.id == id))
            .map(|note| note.name.clone())
            .unwrap_or_else(|| inkling_engine::session::NEW_NOTE_NAME.to_string());

        let mut view = EditorView {
            handle,
            events,
            document: Document::new(),
            suggestion: SuggestionState::None,
            status: SaveStatus::Saved,
            name,
            note_id,
            renaming: None,
        };
        view.drain_events();
        self.message = None;
        self.screen = Screen::Editor(Box::new(view));
    }

    /// Leave the editor, giving the session one last chance to save
    fn close_editor(&mut self) {
        let screen = std::mem::replace(&mut self.screen, Screen::Notes);
        if let Screen::Editor(view) = screen {
            let view = *view;
            match self.runtime.block_on(flush(&view.handle)) {
                Some(SaveStatus::Saved) => {}
                Some(status) => log::warn!("Closed \"{}\" with status {status:?}", view.name),
                None => log::warn!("Gave up waiting for \"{}\" to save", view.name),
            }
            self.runtime.block_on(view.handle.shutdown());
        }
        self.refresh_notes();
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        let Screen::Editor(view) = &mut self.screen else {
            return;
        };

        if let Some(buffer) = view.renaming.as_mut() {
            match key.code {
                KeyCode::Enter => {
                    let name = buffer.trim().to_string();
                    view.renaming = None;
                    if !name.is_empty() {
                        view.name = name.clone();
                        send(view, SessionCommand::Rename(name));
                    }
                }
                KeyCode::Esc => view.renaming = None,
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(c) => buffer.push(c),
                _ => {}
            }
            return;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('t') {
            view.renaming = Some(view.name.clone());
            return;
        }

        if let Some(key) = map_key(key) {
            send(view, SessionCommand::Key(key));
        }
    }
}

fn send(view: &mut EditorView, command: SessionCommand) {
    if let Err(e) = view.handle.send(command) {
        log::warn!("Dropping input: {e}");
    }
}

/// Final save before leaving a note, bounded so a hung store cannot block
/// the exit
async fn flush(handle: &SessionHandle) -> Option<SaveStatus> {
    match tokio::time::timeout(Duration::from_secs(3), handle.flush()).await {
        Ok(Ok(status)) => Some(status),
        Ok(Err(e)) => {
            log::warn!("Session ended before saving: {e}");
            None
        }
        Err(_) => None,
    }
}

fn completion_service(config: &Config) -> Arc<dyn CompletionService> {
    let completion = &config.completion;
    if !completion.enabled {
        return Arc::new(DisabledService);
    }
    let Some(api_key) = config.api_key() else {
        log::warn!(
            "{} is not set, inline completions are disabled",
            completion.api_key_env
        );
        return Arc::new(DisabledService);
    };

    match OpenAiService::new(OpenAiSettings {
        model: completion.model.clone(),
        api_base: completion.api_base.clone(),
        api_key,
        timeout: completion.timeout(),
    }) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            log::warn!("Inline completions are disabled: {e}");
            Arc::new(DisabledService)
        }
    }
}

fn session_settings(completion: &CompletionConfig, autosave_interval: Duration) -> SessionSettings {
    SessionSettings {
        debounce: completion.debounce(),
        autosave_interval,
        max_tokens: completion.max_tokens,
        completion_enabled: completion.enabled,
    }
}

/// Terminal key to editor key. Ctrl chords are formatting shortcuts.
fn map_key(key: KeyEvent) -> Option<Key> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        let KeyCode::Char(c) = key.code else {
            return None;
        };
        let shortcut = match c {
            'b' => Shortcut::Bold,
            'i' => Shortcut::Italic,
            'u' => Shortcut::Underline,
            '1' => Shortcut::Heading(1),
            '2' => Shortcut::Heading(2),
            '.' => Shortcut::OrderedList,
            ',' => Shortcut::BulletList,
            '-' => Shortcut::DashList,
            _ => return None,
        };
        return Some(Key::Shortcut(shortcut));
    }

    Some(match key.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Enter => Key::Enter,
        KeyCode::Tab => Key::Tab,
        KeyCode::BackTab => Key::BackTab,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Delete => Key::Delete,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::Esc => Key::Escape,
        _ => return None,
    })
}

fn init_logging(notes_path: &Path) -> Result<()> {
    // The terminal is in raw mode, so logs go to a file
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(notes_path.join("inkling.log"))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    // Determine notes path from CLI args or config file
    let args: Vec<String> = env::args().collect();
    let config_path = Config::config_path();

    let loaded = match Config::load() {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            eprintln!("Usage: {} <notes-folder-path>", args[0]);
            process::exit(1);
        }
    };

    let (config, from_config) = match (args.len(), loaded) {
        (2, Some(mut config)) => {
            config.notes_path = PathBuf::from(&args[1]);
            (config, false)
        }
        (2, None) => (Config::new(&args[1]), false),
        (1, Some(config)) => (config, true),
        (1, None) => {
            eprintln!("Error: No notes path provided and no config file found");
            eprintln!("Usage: {} <notes-folder-path>", args[0]);
            eprintln!("Or create a config file at {}", config_path.display());
            process::exit(1);
        }
        _ => {
            eprintln!("Usage: {} [notes-folder-path]", args[0]);
            process::exit(1);
        }
    };

    // Validate notes directory using engine
    if let Err(e) = io::validate_notes_dir(&config.notes_path) {
        let source = if from_config {
            format!(" from config file '{}'", config_path.display())
        } else {
            String::new()
        };
        eprintln!(
            "Error: Notes path '{}'{} is invalid: {e}",
            config.notes_path.display(),
            source
        );
        process::exit(1);
    }

    init_logging(&config.notes_path)?;
    log::info!("inkling starting with notes in {}", config.notes_path.display());

    let runtime = Runtime::new()?;
    let mut app = App::new(runtime, &config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let mut redraw = true;
    loop {
        if let Screen::Editor(view) = &mut app.screen {
            redraw |= view.drain_events();
        }
        if redraw {
            terminal.draw(|f| ui(f, app))?;
            redraw = false;
        }

        // Poll so session events are picked up between key presses
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        redraw = true;
        let Event::Key(key) = event::read()? else {
            continue;
        };

        let ctrl_q = key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('q');
        if matches!(app.screen, Screen::Editor(_)) {
            if ctrl_q {
                app.close_editor();
            } else {
                app.handle_editor_key(key);
            }
            continue;
        }

        match key.code {
            KeyCode::Char('q') => return Ok(()),
            _ if ctrl_q => return Ok(()),
            KeyCode::Down | KeyCode::Char('j') => app.next_note(),
            KeyCode::Up | KeyCode::Char('k') => app.previous_note(),
            KeyCode::Enter => app.open_selected(),
            KeyCode::Char('n') => app.open(None),
            KeyCode::Char('r') => app.refresh_notes(),
            _ => {}
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
        .split(f.area());

    let help = match &app.screen {
        Screen::Notes => {
            render_notes(f, &app.notes, &mut app.note_list_state, chunks[0]);
            "q: Quit | ↑/k: Previous | ↓/j: Next | Enter: Open | n: New note | r: Refresh"
        }
        Screen::Editor(view) => {
            render_editor(f, view, chunks[0]);
            "Ctrl+Q: Back | Tab: Accept suggestion / indent | Ctrl+B/I/U: Style | Ctrl+1/2: Heading | Ctrl+./,/-: Lists | Ctrl+T: Rename"
        }
    };

    let footer = match &app.message {
        Some(message) => Line::from(Span::styled(message.clone(), Style::default().fg(Color::Red))),
        None => Line::from(Span::raw(help)),
    };
    f.render_widget(Paragraph::new(vec![footer]), chunks[1]);
}

fn render_notes(f: &mut Frame, notes: &[Note], state: &mut ListState, area: Rect) {
    let items: Vec<ListItem> = notes
        .iter()
        .map(|note| {
            let modified = note.modified.format("%Y-%m-%d %H:%M").to_string();
            ListItem::new(Line::from(vec![
                Span::raw(format!("📄 {}", note.name)),
                Span::styled(format!("  {modified}"), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();

    let title = if items.is_empty() {
        "Notes (none yet, press n)".to_string()
    } else {
        format!("Notes ({})", items.len())
    };
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::Yellow).fg(Color::Black));

    f.render_stateful_widget(list, area, state);
}

fn render_editor(f: &mut Frame, view: &EditorView, area: Rect) {
    let layout = render::layout_document(&view.document.snapshot(), &view.suggestion);

    let status = match view.status {
        SaveStatus::Saving => "Saving...",
        SaveStatus::Dirty => "Changes not saved",
        SaveStatus::Saved => "All changes saved",
    };
    let title = match &view.renaming {
        Some(buffer) => format!("Rename: {buffer}_"),
        None => format!("{} | {status}", view.name),
    };

    let inner_height = area.height.saturating_sub(2);
    let (row, col) = layout.caret;
    let scroll = (row + 1).saturating_sub(inner_height);

    let content = Paragraph::new(layout.lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .scroll((scroll, 0));
    f.render_widget(content, area);

    if view.renaming.is_none() {
        f.set_cursor_position((area.x + 1 + col, area.y + 1 + row.saturating_sub(scroll)));
    }
}
