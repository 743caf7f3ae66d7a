//! Key handling: turns key presses into document commands and arbitrates
//! between the document and the ghost suggestion.

use std::sync::OnceLock;

use regex::Regex;

use crate::editing::{Block, Cmd, Document, EditError, InlineStyle, ListKind};
use crate::overlay::{Suggestion, SuggestionOverlay, SuggestionState};

/// Editor-level shortcuts (Ctrl/Cmd chords in a frontend)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Bold,
    Italic,
    Underline,
    Heading(u8),
    OrderedList,
    BulletList,
    DashList,
}

/// Frontend-independent key presses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Tab,
    /// Shift-Tab
    BackTab,
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
    Escape,
    Shortcut(Shortcut),
}

/// What a key press did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyOutcome {
    /// The plain text changed (re-arms the completion debounce)
    pub text_changed: bool,
    /// Anything observable changed: text, structure, styles or selection
    pub document_changed: bool,
    /// The ghost suggestion was accepted into the document
    pub accepted: bool,
    /// A shown suggestion went away (accepted or dismissed)
    pub suggestion_cleared: bool,
}

/// A document plus the suggestion drawn over it
#[derive(Debug, Clone, Default)]
pub struct Editor {
    document: Document,
    overlay: SuggestionOverlay,
}

impl Editor {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            overlay: SuggestionOverlay::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn overlay(&self) -> &SuggestionOverlay {
        &self.overlay
    }

    pub fn suggestion_state(&self) -> SuggestionState {
        self.overlay.state()
    }

    /// Offer a completion result. Shown only if the caret is still at the
    /// suggestion's anchor.
    pub fn offer(&mut self, suggestion: Suggestion) -> bool {
        let cursor = self.document.cursor();
        self.overlay.show(suggestion, &cursor)
    }

    pub fn dismiss_suggestion(&mut self) -> bool {
        let active = self.overlay.is_active();
        self.overlay.dismiss();
        active
    }

    /// Apply a command coming from the host rather than a key. Any visible
    /// change makes a shown suggestion stale.
    pub fn apply(&mut self, cmd: Cmd) -> Result<KeyOutcome, EditError> {
        let next = self.document.apply(cmd)?;
        let mut outcome = self.replace_document(next);
        if outcome.document_changed && self.dismiss_suggestion() {
            outcome.suggestion_cleared = true;
        }
        Ok(outcome)
    }

    pub fn handle_key(&mut self, key: Key) -> KeyOutcome {
        let mut cleared = false;

        if self.overlay.is_active() {
            if key == Key::Tab {
                if let Some(accepted) = self.overlay.accept(&self.document) {
                    let mut outcome = self.replace_document(accepted);
                    outcome.accepted = true;
                    outcome.suggestion_cleared = true;
                    return outcome;
                }
                // Anchor went stale: fall through to a plain Tab
            } else {
                self.overlay.dismiss();
            }
            cleared = true;
        }

        let commands = self.commands_for(key);
        let mut outcome = match self.run(commands) {
            Ok(Some(next)) => self.replace_document(next),
            Ok(None) => KeyOutcome::default(),
            Err(error) => {
                log::debug!("Ignoring {key:?}: {error}");
                KeyOutcome::default()
            }
        };
        outcome.suggestion_cleared = cleared;
        outcome
    }

    /// Apply a command sequence all-or-nothing
    fn run(&self, commands: Vec<Cmd>) -> Result<Option<Document>, EditError> {
        if commands.is_empty() {
            return Ok(None);
        }
        let mut doc = self.document.clone();
        for cmd in commands {
            doc = doc.apply(cmd)?;
        }
        Ok(Some(doc))
    }

    fn replace_document(&mut self, next: Document) -> KeyOutcome {
        let text_changed = next.text() != self.document.text();
        let document_changed = next != self.document;
        self.document = next;
        KeyOutcome {
            text_changed,
            document_changed,
            ..KeyOutcome::default()
        }
    }

    fn commands_for(&self, key: Key) -> Vec<Cmd> {
        let doc = &self.document;
        let selection = doc.selection();
        let at = selection.end;
        let collapsed = selection.is_empty();
        let cursor = doc.cursor();
        let in_list = cursor.path.is_list_item();

        match key {
            Key::Char(c) => {
                if c == ' '
                    && collapsed
                    && let Some(commands) = self.list_autoformat()
                {
                    return commands;
                }
                let text = c.to_string();
                if collapsed {
                    vec![Cmd::InsertText { at, text }]
                } else {
                    vec![Cmd::ReplaceRange {
                        range: selection,
                        text,
                    }]
                }
            }
            Key::Enter => {
                if collapsed {
                    vec![Cmd::SplitBlock { at }]
                } else {
                    vec![
                        Cmd::DeleteRange {
                            range: selection.clone(),
                        },
                        Cmd::SplitBlock {
                            at: selection.start,
                        },
                    ]
                }
            }
            Key::Tab if in_list => vec![Cmd::IndentItem { at }],
            Key::BackTab if in_list => vec![Cmd::OutdentItem { at }],
            Key::Tab | Key::BackTab | Key::Escape => Vec::new(),
            Key::Backspace => {
                if !collapsed {
                    vec![Cmd::DeleteRange { range: selection }]
                } else if in_list && cursor.offset == 0 {
                    vec![Cmd::OutdentItem { at }]
                } else if at > 0 {
                    vec![Cmd::DeleteRange { range: at - 1..at }]
                } else {
                    Vec::new()
                }
            }
            Key::Delete => {
                if !collapsed {
                    vec![Cmd::DeleteRange { range: selection }]
                } else if at < doc.len() {
                    vec![Cmd::DeleteRange { range: at..at + 1 }]
                } else {
                    Vec::new()
                }
            }
            Key::Left => {
                let to = if collapsed {
                    at.saturating_sub(1)
                } else {
                    selection.start
                };
                vec![Cmd::Select { range: to..to }]
            }
            Key::Right => {
                let to = if collapsed { at + 1 } else { selection.end };
                vec![Cmd::Select { range: to..to }]
            }
            Key::Home => {
                let start = at - cursor.offset;
                vec![Cmd::Select { range: start..start }]
            }
            Key::End => {
                let end = doc
                    .snapshot()
                    .cursor_block()
                    .map(|block| block.range.end)
                    .unwrap_or(at);
                vec![Cmd::Select { range: end..end }]
            }
            Key::Shortcut(shortcut) => vec![shortcut_command(shortcut, selection)],
        }
    }

    /// Space right after a lone `*`, `-` or `1.` at the start of a
    /// top-level paragraph turns the paragraph into a list
    fn list_autoformat(&self) -> Option<Vec<Cmd>> {
        let doc = &self.document;
        let cursor = doc.cursor();
        let [block] = cursor.path.as_slice() else {
            return None;
        };
        let Some(Block::Paragraph(content)) = doc.blocks().get(*block) else {
            return None;
        };

        let prefix: String = content.to_plain().chars().take(cursor.offset).collect();
        let kind = list_prefix_kind(&prefix)?;
        let at = doc.selection().end;
        let start = at - cursor.offset;

        Some(vec![
            Cmd::DeleteRange { range: start..at },
            Cmd::ToggleList { at: start, kind },
        ])
    }
}

fn shortcut_command(shortcut: Shortcut, selection: std::ops::Range<usize>) -> Cmd {
    let at = selection.end;
    match shortcut {
        Shortcut::Bold => Cmd::ToggleStyle {
            range: selection,
            style: InlineStyle::Bold,
        },
        Shortcut::Italic => Cmd::ToggleStyle {
            range: selection,
            style: InlineStyle::Italic,
        },
        Shortcut::Underline => Cmd::ToggleStyle {
            range: selection,
            style: InlineStyle::Underline,
        },
        Shortcut::Heading(level) => Cmd::ToggleHeading {
            range: selection,
            level,
        },
        Shortcut::OrderedList => Cmd::ToggleList {
            at,
            kind: ListKind::Ordered,
        },
        Shortcut::BulletList => Cmd::ToggleList {
            at,
            kind: ListKind::Bullet,
        },
        Shortcut::DashList => Cmd::ToggleList {
            at,
            kind: ListKind::Dash,
        },
    }
}

fn list_prefix_kind(prefix: &str) -> Option<ListKind> {
    static LIST_PREFIX: OnceLock<Regex> = OnceLock::new();
    let regex =
        LIST_PREFIX.get_or_init(|| Regex::new(r"^(\*|-|\d+\.)$").expect("Invalid list prefix regex"));

    let captures = regex.captures(prefix)?;
    match &captures[1] {
        "*" => Some(ListKind::Bullet),
        "-" => Some(ListKind::Dash),
        _ => Some(ListKind::Ordered),
    }
}
