use std::ops::Range;

use crate::editing::document::{ListKind, visit_text_blocks};
use crate::editing::{CursorMarker, Document, NodePath, Run};

/// Immutable render view of a document.
///
/// Snapshots flatten the block tree into the text blocks a frontend draws,
/// in document order, with everything needed to place them on screen
/// (kind, nesting depth, list numbering) and to map the caret back onto
/// them. Frontends render from snapshots and send edits back as commands;
/// they never reach into the block tree.
///
/// ```rust
/// use inkling_engine::editing::{BlockKind, Document};
///
/// let doc = Document::from_markup("<h1>Plan</h1><ol><li>one</li><li>two</li></ol>").unwrap();
/// let snapshot = doc.snapshot();
///
/// assert_eq!(snapshot.blocks[0].kind, BlockKind::Heading { level: 1 });
/// assert_eq!(snapshot.blocks[2].content, "two");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Document version for change detection
    pub version: u64,
    /// Text blocks in document order
    pub blocks: Vec<RenderBlock>,
    pub selection: Range<usize>,
    pub cursor: CursorMarker,
}

/// One drawable text block
#[derive(Debug, Clone, PartialEq)]
pub struct RenderBlock {
    pub path: NodePath,
    pub kind: BlockKind,
    /// List nesting depth, 0 for top-level items and non-list blocks
    pub depth: usize,
    /// Char range of the content in the plain text projection
    pub range: Range<usize>,
    pub content: String,
    /// Styled runs making up `content`
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    Heading { level: u8 },
    /// `number` is the 1-based position inside the containing list
    ListItem { kind: ListKind, number: usize },
}

impl Snapshot {
    /// The block holding the caret
    pub fn cursor_block(&self) -> Option<&RenderBlock> {
        self.blocks
            .iter()
            .find(|block| block.path == self.cursor.path)
    }

    pub fn block_at(&self, path: &NodePath) -> Option<&RenderBlock> {
        self.blocks.iter().find(|block| &block.path == path)
    }
}

pub(crate) fn create_snapshot(doc: &Document) -> Snapshot {
    let mut blocks = Vec::new();
    let mut start = 0;

    visit_text_blocks(doc.blocks(), |path, kind, content| {
        let len = content.len();
        let path = NodePath::new(path.to_vec());
        blocks.push(RenderBlock {
            depth: path.depth(),
            path,
            kind,
            range: start..start + len,
            content: content.to_plain(),
            runs: content.runs().to_vec(),
        });
        start += len + 1;
    });

    Snapshot {
        version: doc.version(),
        blocks,
        selection: doc.selection(),
        cursor: doc.cursor(),
    }
}
