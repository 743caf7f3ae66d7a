/*!
 * # Editing Core Module
 *
 * The rich-text document model and every transformation on it.
 *
 * ## Architecture Overview
 *
 * ### 1. Single Source of Truth: the block tree
 * - A note body is a sequence of **blocks**: paragraphs, headings and
 *   (possibly nested) lists whose items hold styled inline text
 * - Inline text is a normalized list of styled **runs** (`RichText`)
 * - Storage is shared behind an `Arc` and copied only when a command
 *   changes text or structure
 *
 * ### 2. Command-Based Editing
 * - All edits are **Commands** (`Cmd` enum)
 * - `Document::apply` is pure: it returns a new `Document` or an `EditError`
 *   and never mutates the receiver
 * - Positions are char offsets into the plain text projection (text blocks
 *   joined by `\n`); `CursorMarker`s give the structural view of an offset
 *
 * ### 3. Markup at the edges
 * - Notes are stored as HTML-like markup (`<p>`, `<h1>`..`<h6>`, `<ul>`,
 *   `<ol>`, `<ul class="dash-list">`, `<strong>`, `<em>`, `<u>`, `<br>`)
 * - `Document::from_markup` is lenient, `Document::markup` is canonical
 *
 * ### 4. Read API: Immutable Snapshots
 * - Frontends render from `Snapshot`s: flat `RenderBlock`s in document
 *   order with kind, depth and char ranges
 *
 * ## Module Structure
 *
 * - **`rich_text`**: styled runs and their edits
 * - **`cursor`**: `NodePath` and `CursorMarker`
 * - **`document`**: `Document` and the block tree types
 * - **`commands`**: `Cmd`, `EditError` and command execution
 * - **`markup`**: markup reader and canonical writer
 * - **`snapshot`**: render view for UI consumption
 *
 * ## Usage Pattern
 *
 * ```rust
 * use inkling_engine::editing::*;
 *
 * // 1. Load a stored note body
 * let doc = Document::from_markup("<h1>Hello</h1><ul><li>Item 1</li><li>Item 2</li></ul>").unwrap();
 *
 * // 2. Apply edits via commands (each returns a new document)
 * let doc = doc.apply(Cmd::IndentItem { at: 13 }).unwrap();
 *
 * // 3. Get an immutable snapshot for rendering
 * let snapshot = doc.snapshot();
 * assert_eq!(snapshot.blocks[2].depth, 1);
 *
 * // 4. Save canonical markup
 * assert_eq!(
 *     doc.markup(),
 *     "<h1>Hello</h1><ul><li>Item 1<ul><li>Item 2</li></ul></li></ul>"
 * );
 * ```
 */

pub mod commands;
pub mod cursor;
pub mod document;
pub mod markup;
pub mod rich_text;
pub mod snapshot;

pub use commands::{Cmd, EditError};
pub use cursor::{CursorMarker, NodePath};
pub use document::{Block, Document, List, ListItem, ListKind};
pub use markup::MarkupError;
pub use rich_text::{InlineStyle, RichText, Run, Style};
pub use snapshot::{BlockKind, RenderBlock, Snapshot};
