//! The ghost suggestion shown at the caret.
//!
//! A suggestion is never part of the document: it is drawn over it and only
//! becomes text when accepted.

use chrono::{DateTime, Utc};

use crate::editing::{Cmd, CursorMarker, Document};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub text: String,
    /// Where the caret was when the request was issued
    pub anchor: CursorMarker,
    pub created_at: DateTime<Utc>,
}

impl Suggestion {
    pub fn new(text: impl Into<String>, anchor: CursorMarker) -> Self {
        Self {
            text: text.into(),
            anchor,
            created_at: Utc::now(),
        }
    }
}

/// What the host should draw
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SuggestionState {
    #[default]
    None,
    Shown {
        text: String,
        anchor: CursorMarker,
    },
}

#[derive(Debug, Clone, Default)]
pub struct SuggestionOverlay {
    current: Option<Suggestion>,
}

impl SuggestionOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `suggestion` if the caret is still where it was requested.
    /// Returns whether it is now displayed; on `false` the previous
    /// suggestion (if any) is kept.
    pub fn show(&mut self, suggestion: Suggestion, cursor: &CursorMarker) -> bool {
        if suggestion.text.is_empty() {
            return false;
        }
        if &suggestion.anchor != cursor {
            log::debug!(
                "Discarding suggestion anchored at {} (cursor at {})",
                suggestion.anchor,
                cursor
            );
            return false;
        }
        self.current = Some(suggestion);
        true
    }

    /// Splice the suggestion into `doc` at its anchor, leaving the caret at
    /// the end of the inserted text. Clears the overlay either way; `None`
    /// when nothing was shown or the anchor no longer exists.
    pub fn accept(&mut self, doc: &Document) -> Option<Document> {
        let suggestion = self.current.take()?;
        let at = doc.offset_of(&suggestion.anchor)?;
        let end = at + suggestion.text.chars().count();

        let inserted = doc
            .apply(Cmd::InsertText {
                at,
                text: suggestion.text,
            })
            .ok()?;
        inserted.apply(Cmd::Select { range: end..end }).ok()
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&Suggestion> {
        self.current.as_ref()
    }

    pub fn state(&self) -> SuggestionState {
        match &self.current {
            Some(suggestion) => SuggestionState::Shown {
                text: suggestion.text.clone(),
                anchor: suggestion.anchor.clone(),
            },
            None => SuggestionState::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello() -> Document {
        Document::from_markup("<p>hello</p>").unwrap()
    }

    #[test]
    fn test_show_requires_matching_cursor() {
        let doc = hello();
        let mut overlay = SuggestionOverlay::new();

        let moved = CursorMarker::new(vec![0], 2);
        assert!(!overlay.show(Suggestion::new(" world", moved), &doc.cursor()));
        assert_eq!(overlay.state(), SuggestionState::None);

        assert!(overlay.show(Suggestion::new(" world", doc.cursor()), &doc.cursor()));
        assert_eq!(
            overlay.state(),
            SuggestionState::Shown {
                text: " world".to_string(),
                anchor: CursorMarker::new(vec![0], 5),
            }
        );
    }

    #[test]
    fn test_empty_suggestion_is_never_shown() {
        let doc = hello();
        let mut overlay = SuggestionOverlay::new();

        assert!(!overlay.show(Suggestion::new("", doc.cursor()), &doc.cursor()));
        assert!(!overlay.is_active());
    }

    #[test]
    fn test_accept_splices_at_anchor() {
        let doc = hello();
        let mut overlay = SuggestionOverlay::new();
        overlay.show(Suggestion::new(" world", doc.cursor()), &doc.cursor());

        let accepted = overlay.accept(&doc).unwrap();

        assert_eq!(accepted.text(), "hello world");
        assert_eq!(accepted.selection(), 11..11);
        assert!(!overlay.is_active());
    }

    #[test]
    fn test_accept_with_stale_anchor_clears() {
        let mut overlay = SuggestionOverlay::new();
        let doc = hello();
        overlay.show(Suggestion::new("x", doc.cursor()), &doc.cursor());

        let shorter = Document::from_markup("<p>hi</p>").unwrap();
        assert_eq!(overlay.accept(&shorter), None);
        assert!(!overlay.is_active());
        assert_eq!(overlay.accept(&doc), None);
    }

    #[test]
    fn test_dismiss_leaves_document_alone() {
        let doc = hello();
        let before = doc.clone();
        let mut overlay = SuggestionOverlay::new();
        overlay.show(Suggestion::new(" world", doc.cursor()), &doc.cursor());

        overlay.dismiss();

        assert!(!overlay.is_active());
        assert_eq!(doc, before);
        assert_eq!(doc.selection(), 5..5);
    }
}
