use std::ops::Range;
use std::sync::Arc;

use crate::editing::markup::{self, MarkupError};
use crate::editing::snapshot::{BlockKind, Snapshot};
use crate::editing::{Cmd, CursorMarker, EditError, RichText};

/// Marker style of a list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Bullet,  // <ul>
    Ordered, // <ol>
    Dash,    // <ul class="dash-list">
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct List {
    pub kind: ListKind,
    pub items: Vec<ListItem>,
}

impl List {
    pub fn new(kind: ListKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub content: RichText,
    /// Nested sublist, never `Some` with zero items
    pub children: Option<List>,
}

impl ListItem {
    pub fn new(content: RichText) -> Self {
        Self {
            content,
            children: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(RichText),
    Heading { level: u8, content: RichText },
    List(List),
}

/// A formatted note body plus the caret/selection.
///
/// `Document` is an immutable value: [`Document::apply`] returns a new
/// document and leaves `self` untouched. Block storage is shared behind an
/// `Arc` and only copied when a command actually changes structure or text,
/// so selection-only commands and clones are cheap.
///
/// Positions are char offsets into the plain text projection ([`Document::text`]):
/// every text block (paragraph, heading, list item) in document order,
/// joined by `\n`. [`CursorMarker`]s are derived from those offsets on demand.
///
/// ```rust
/// use inkling_engine::editing::{Cmd, Document};
///
/// let doc = Document::from_markup("<p>hello</p>").unwrap();
/// let doc = doc
///     .apply(Cmd::InsertText { at: 5, text: " world".to_string() })
///     .unwrap();
///
/// assert_eq!(doc.text(), "hello world");
/// assert_eq!(doc.markup(), "<p>hello world</p>");
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    blocks: Arc<Vec<Block>>,
    selection: Range<usize>,
    /// Incremented on every applied command
    version: u64,
}

impl Document {
    /// An empty document: a single empty paragraph
    pub fn new() -> Self {
        Self::from_blocks(Vec::new())
    }

    /// Build a document from blocks, placing the cursor at the end
    pub fn from_blocks(mut blocks: Vec<Block>) -> Self {
        normalize_blocks(&mut blocks);
        let len = text_len(&layout(&blocks));
        Self {
            blocks: Arc::new(blocks),
            selection: len..len,
            version: 0,
        }
    }

    pub fn from_markup(markup: &str) -> Result<Self, MarkupError> {
        Ok(Self::from_blocks(markup::parse(markup)?))
    }

    /// Canonical markup. `Document::from_markup(&doc.markup())` yields `doc`
    /// again (with the cursor at the end).
    pub fn markup(&self) -> String {
        markup::serialize(&self.blocks)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Plain text projection used for offsets and completion prompts
    pub fn text(&self) -> String {
        let mut parts = Vec::new();
        visit_text_blocks(&self.blocks, |_, _, content| parts.push(content.to_plain()));
        parts.join("\n")
    }

    /// Length of [`Document::text`] in chars
    pub fn len(&self) -> usize {
        text_len(&layout(&self.blocks))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when there is nothing but whitespace to complete from
    pub fn is_blank(&self) -> bool {
        self.text().trim().is_empty()
    }

    pub fn selection(&self) -> Range<usize> {
        self.selection.clone()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Marker for the caret (the end of the selection)
    pub fn cursor(&self) -> CursorMarker {
        self.locate(self.selection.end)
    }

    /// Structural position of a global offset. Offsets past the end are clamped.
    pub fn locate(&self, offset: usize) -> CursorMarker {
        let spans = layout(&self.blocks);
        let (index, local) = position(&spans, offset);
        match spans.get(index) {
            Some(span) => CursorMarker::new(span.path.clone(), local),
            None => CursorMarker::new(vec![0], 0),
        }
    }

    /// Global offset of a marker, or `None` if it no longer addresses a
    /// text block or its offset is past that block's end.
    pub fn offset_of(&self, marker: &CursorMarker) -> Option<usize> {
        layout(&self.blocks)
            .into_iter()
            .find(|span| span.path.as_slice() == marker.path.as_slice())
            .filter(|span| marker.offset <= span.len)
            .map(|span| span.start + marker.offset)
    }

    pub fn snapshot(&self) -> Snapshot {
        crate::editing::snapshot::create_snapshot(self)
    }

    /// Apply a command, returning the resulting document.
    ///
    /// Text commands validate their offsets against the current length;
    /// structural list commands fail with [`EditError::NotInList`] when the
    /// offset is not inside a list item. Blocks are normalized afterwards
    /// (empty sublists pruned, at least one text block kept).
    pub fn apply(&self, cmd: Cmd) -> Result<Document, EditError> {
        let edit = crate::editing::commands::execute(&self.blocks, self.selection.clone(), &cmd)?;

        let blocks = match edit.blocks {
            Some(mut blocks) => {
                normalize_blocks(&mut blocks);
                Arc::new(blocks)
            }
            None => Arc::clone(&self.blocks),
        };

        let len = text_len(&layout(&blocks));
        let start = edit.selection.start.min(len);
        let end = edit.selection.end.min(len).max(start);

        Ok(Document {
            blocks,
            selection: start..end,
            version: self.version + 1,
        })
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        // Version is edit history, not content
        self.blocks == other.blocks && self.selection == other.selection
    }
}

/// Character span of one text block in the plain text projection
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextSpan {
    pub path: Vec<usize>,
    pub start: usize,
    pub len: usize,
}

impl TextSpan {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Walk every text block in document order
pub(crate) fn visit_text_blocks<F>(blocks: &[Block], mut visit: F)
where
    F: FnMut(&[usize], BlockKind, &RichText),
{
    let mut path = Vec::new();
    for (index, block) in blocks.iter().enumerate() {
        path.push(index);
        match block {
            Block::Paragraph(content) => visit(&path, BlockKind::Paragraph, content),
            Block::Heading { level, content } => {
                visit(&path, BlockKind::Heading { level: *level }, content)
            }
            Block::List(list) => visit_items(list, &mut path, &mut visit),
        }
        path.pop();
    }
}

fn visit_items<F>(list: &List, path: &mut Vec<usize>, visit: &mut F)
where
    F: FnMut(&[usize], BlockKind, &RichText),
{
    for (index, item) in list.items.iter().enumerate() {
        path.push(index);
        let kind = BlockKind::ListItem {
            kind: list.kind,
            number: index + 1,
        };
        visit(path, kind, &item.content);
        if let Some(children) = &item.children {
            visit_items(children, path, visit);
        }
        path.pop();
    }
}

pub(crate) fn layout(blocks: &[Block]) -> Vec<TextSpan> {
    let mut spans = Vec::new();
    let mut start = 0;
    visit_text_blocks(blocks, |path, _, content| {
        let len = content.len();
        spans.push(TextSpan {
            path: path.to_vec(),
            start,
            len,
        });
        start += len + 1;
    });
    spans
}

pub(crate) fn text_len(spans: &[TextSpan]) -> usize {
    spans.last().map(TextSpan::end).unwrap_or(0)
}

/// Index of the span containing `offset` and the local offset inside it.
/// An offset on a block boundary belongs to the block it ends.
pub(crate) fn position(spans: &[TextSpan], offset: usize) -> (usize, usize) {
    for (index, span) in spans.iter().enumerate() {
        if offset <= span.end() {
            return (index, offset.saturating_sub(span.start));
        }
    }
    let last = spans.len().saturating_sub(1);
    (last, spans.last().map(|span| span.len).unwrap_or(0))
}

pub(crate) fn content_at<'a>(blocks: &'a [Block], path: &[usize]) -> Option<&'a RichText> {
    let (first, rest) = path.split_first()?;
    match blocks.get(*first)? {
        Block::Paragraph(content) | Block::Heading { content, .. } if rest.is_empty() => {
            Some(content)
        }
        Block::List(list) => list_item(list, rest).map(|item| &item.content),
        _ => None,
    }
}

pub(crate) fn content_at_mut<'a>(
    blocks: &'a mut [Block],
    path: &[usize],
) -> Option<&'a mut RichText> {
    let (first, rest) = path.split_first()?;
    match blocks.get_mut(*first)? {
        Block::Paragraph(content) | Block::Heading { content, .. } if rest.is_empty() => {
            Some(content)
        }
        Block::List(list) => list_item_mut(list, rest).map(|item| &mut item.content),
        _ => None,
    }
}

fn list_item<'a>(list: &'a List, path: &[usize]) -> Option<&'a ListItem> {
    let (index, rest) = path.split_first()?;
    let item = list.items.get(*index)?;
    if rest.is_empty() {
        Some(item)
    } else {
        list_item(item.children.as_ref()?, rest)
    }
}

fn list_item_mut<'a>(list: &'a mut List, path: &[usize]) -> Option<&'a mut ListItem> {
    let (index, rest) = path.split_first()?;
    let item = list.items.get_mut(*index)?;
    if rest.is_empty() {
        Some(item)
    } else {
        list_item_mut(item.children.as_mut()?, rest)
    }
}

/// The list item at a full item path (`[block, item, ...]`)
pub(crate) fn item_at_mut<'a>(blocks: &'a mut [Block], path: &[usize]) -> Option<&'a mut ListItem> {
    let (block, rest) = path.split_first()?;
    let Block::List(list) = blocks.get_mut(*block)? else {
        return None;
    };
    list_item_mut(list, rest)
}

/// The list directly containing the item at `item_path`
pub(crate) fn parent_list_mut<'a>(
    blocks: &'a mut [Block],
    item_path: &[usize],
) -> Option<&'a mut List> {
    let (_, parent) = item_path.split_last()?;
    match parent {
        [] => None,
        [block] => match blocks.get_mut(*block)? {
            Block::List(list) => Some(list),
            _ => None,
        },
        _ => item_at_mut(blocks, parent)?.children.as_mut(),
    }
}

/// Prune empty lists and sublists; keep at least one text block
pub(crate) fn normalize_blocks(blocks: &mut Vec<Block>) {
    blocks.retain_mut(|block| match block {
        Block::List(list) => {
            prune_list(list);
            !list.items.is_empty()
        }
        _ => true,
    });
    if blocks.is_empty() {
        blocks.push(Block::Paragraph(RichText::new()));
    }
}

fn prune_list(list: &mut List) {
    for item in &mut list.items {
        let empty = match &mut item.children {
            Some(children) => {
                prune_list(children);
                children.items.is_empty()
            }
            None => false,
        };
        if empty {
            item.children = None;
        }
    }
}
