use std::borrow::Cow;
use std::ops::{Range, RangeInclusive};

use crate::editing::document::{
    Block, List, ListItem, ListKind, TextSpan, content_at, content_at_mut, item_at_mut, layout,
    parent_list_mut, position, text_len,
};
use crate::editing::{InlineStyle, RichText};

/// Edit commands. Offsets are char positions in the document's plain text
/// projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cmd {
    /// Insert text, inheriting the style of the preceding char
    InsertText { at: usize, text: String },
    /// Delete a range, joining blocks when it spans a boundary
    DeleteRange { range: Range<usize> },
    /// Delete then insert; the caret lands after the new text
    ReplaceRange { range: Range<usize>, text: String },
    /// Enter: split the text block at an offset
    SplitBlock { at: usize },
    /// Flip an inline style on every char of the range
    ToggleStyle {
        range: Range<usize>,
        style: InlineStyle,
    },
    /// Turn top-level blocks touched by the range into headings (or back)
    ToggleHeading { range: Range<usize>, level: u8 },
    /// Convert the block at an offset into a list item, or out of one
    ToggleList { at: usize, kind: ListKind },
    /// Nest the list item at an offset one level deeper
    IndentItem { at: usize },
    /// Move the list item at an offset one level up
    OutdentItem { at: usize },
    Select { range: Range<usize> },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("range {start}..{end} is outside the document (length {len})")]
    OutOfBounds { start: usize, end: usize, len: usize },

    #[error("no list item at offset {0}")]
    NotInList(usize),

    #[error("heading level {0} is not between 1 and 6")]
    InvalidHeadingLevel(u8),

    #[error("headings cannot be applied to list items")]
    HeadingInList,
}

/// Result of executing a command: new blocks if anything structural or
/// textual changed, and the new selection (unnormalized, unclamped).
pub(crate) struct Edit {
    pub blocks: Option<Vec<Block>>,
    pub selection: Range<usize>,
}

pub(crate) fn execute(
    blocks: &[Block],
    selection: Range<usize>,
    cmd: &Cmd,
) -> Result<Edit, EditError> {
    let len = text_len(&layout(blocks));
    let mut draft = Draft {
        blocks: Cow::Borrowed(blocks),
        selection,
    };

    match cmd {
        Cmd::InsertText { at, text } => {
            check_range(&(*at..*at), len)?;
            draft.insert(*at, text);
        }
        Cmd::DeleteRange { range } => {
            check_range(range, len)?;
            draft.delete(range.clone());
        }
        Cmd::ReplaceRange { range, text } => {
            check_range(range, len)?;
            draft.delete(range.clone());
            draft.insert(range.start, text);
            let end = range.start + text.chars().count();
            draft.selection = end..end;
        }
        Cmd::SplitBlock { at } => {
            check_range(&(*at..*at), len)?;
            draft.split(*at);
        }
        Cmd::ToggleStyle { range, style } => {
            check_range(range, len)?;
            draft.toggle_style(range.clone(), *style);
        }
        Cmd::ToggleHeading { range, level } => {
            if !(1..=6).contains(level) {
                return Err(EditError::InvalidHeadingLevel(*level));
            }
            check_range(range, len)?;
            draft.toggle_heading(range.clone(), *level)?;
        }
        Cmd::ToggleList { at, kind } => {
            check_range(&(*at..*at), len)?;
            draft.toggle_list(*at, *kind);
        }
        Cmd::IndentItem { at } => {
            check_range(&(*at..*at), len)?;
            draft.indent(*at)?;
        }
        Cmd::OutdentItem { at } => {
            check_range(&(*at..*at), len)?;
            draft.outdent(*at)?;
        }
        Cmd::Select { range } => {
            let start = range.start.min(range.end).min(len);
            let end = range.start.max(range.end).min(len);
            draft.selection = start..end;
        }
    }

    Ok(draft.finish())
}

fn check_range(range: &Range<usize>, len: usize) -> Result<(), EditError> {
    if range.start > range.end || range.end > len {
        return Err(EditError::OutOfBounds {
            start: range.start,
            end: range.end,
            len,
        });
    }
    Ok(())
}

/// Blocks being edited. Borrowed until the first mutation.
struct Draft<'a> {
    blocks: Cow<'a, [Block]>,
    selection: Range<usize>,
}

impl Draft<'_> {
    fn finish(self) -> Edit {
        let blocks = match self.blocks {
            Cow::Owned(blocks) => Some(blocks),
            Cow::Borrowed(_) => None,
        };
        Edit {
            blocks,
            selection: self.selection,
        }
    }

    fn insert(&mut self, at: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        let spans = layout(&self.blocks);
        let (index, local) = position(&spans, at);
        let Some(span) = spans.get(index) else {
            return;
        };
        if let Some(content) = content_at_mut(self.blocks.to_mut(), &span.path) {
            let style = content.style_before(local);
            content.insert(local, text, style);
        }
        self.selection = shift_for_insert(&self.selection, at, text.chars().count());
    }

    fn delete(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        let spans = layout(&self.blocks);
        let (first, start_local) = position(&spans, range.start);
        let (last, end_local) = position(&spans, range.end);
        let blocks = self.blocks.to_mut();

        if first == last {
            if let Some(content) = content_at_mut(blocks, &spans[first].path) {
                content.delete(start_local..end_local);
            }
        } else {
            // Keep the head of the first block and the tail of the last,
            // drop everything in between
            let tail = content_at(blocks, &spans[last].path)
                .map(|content| content.clone().split_off(end_local))
                .unwrap_or_default();
            if let Some(head) = content_at_mut(blocks, &spans[first].path) {
                let len = head.len();
                head.delete(start_local..len);
                head.append(tail);
            }
            for span in spans[first + 1..=last].iter().rev() {
                remove_text_block(blocks, &span.path);
            }
        }

        self.selection = shift_for_delete(&self.selection, &range);
    }

    fn split(&mut self, at: usize) {
        let spans = layout(&self.blocks);
        let (index, local) = position(&spans, at);
        let Some(path) = spans.get(index).map(|span| span.path.clone()) else {
            return;
        };
        let blocks = self.blocks.to_mut();

        match path.as_slice() {
            [block] => {
                let block = *block;
                let tail = match &mut blocks[block] {
                    // Enter at the start of a heading pushes it down
                    Block::Heading { content, .. } if local == 0 && !content.is_empty() => None,
                    Block::Paragraph(content) | Block::Heading { content, .. } => {
                        Some(content.split_off(local))
                    }
                    Block::List(_) => return,
                };
                match tail {
                    Some(tail) => blocks.insert(block + 1, Block::Paragraph(tail)),
                    None => blocks.insert(block, Block::Paragraph(RichText::new())),
                }
            }
            item_path => {
                let Some(&item_index) = item_path.last() else {
                    return;
                };
                let Some(list) = parent_list_mut(blocks, item_path) else {
                    return;
                };
                let item = &mut list.items[item_index];
                let sibling = ListItem {
                    content: item.content.split_off(local),
                    children: item.children.take(),
                };
                list.items.insert(item_index + 1, sibling);
            }
        }

        self.selection = at + 1..at + 1;
    }

    fn toggle_style(&mut self, range: Range<usize>, style: InlineStyle) {
        if range.is_empty() {
            return;
        }
        for span in layout(&self.blocks) {
            let start = range.start.max(span.start);
            let end = range.end.min(span.end());
            if start >= end {
                continue;
            }
            if let Some(content) = content_at_mut(self.blocks.to_mut(), &span.path) {
                content.toggle(start - span.start..end - span.start, style);
            }
        }
    }

    fn toggle_heading(&mut self, range: Range<usize>, level: u8) -> Result<(), EditError> {
        let spans = layout(&self.blocks);
        let targets: Vec<usize> = spans[touched(&spans, &range)]
            .iter()
            .filter(|span| span.path.len() == 1)
            .map(|span| span.path[0])
            .collect();
        if targets.is_empty() {
            return Err(EditError::HeadingInList);
        }

        let all_at_level = targets.iter().all(|block| {
            matches!(self.blocks[*block], Block::Heading { level: current, .. } if current == level)
        });

        let blocks = self.blocks.to_mut();
        for block in targets {
            let content = match &mut blocks[block] {
                Block::Paragraph(content) | Block::Heading { content, .. } => {
                    std::mem::take(content)
                }
                Block::List(_) => continue,
            };
            blocks[block] = if all_at_level {
                Block::Paragraph(content)
            } else {
                Block::Heading { level, content }
            };
        }
        Ok(())
    }

    fn toggle_list(&mut self, at: usize, kind: ListKind) {
        let spans = layout(&self.blocks);
        let (index, local) = position(&spans, at);
        let Some(path) = spans.get(index).map(|span| span.path.clone()) else {
            return;
        };
        let blocks = self.blocks.to_mut();

        let new_path = if let [block] = path.as_slice() {
            Some(wrap_in_list(blocks, *block, kind))
        } else {
            match parent_list_mut(blocks, &path).map(|list| list.kind == kind) {
                // Same kind again: take the item out of the list
                Some(true) => outdent_item(blocks, &path),
                Some(false) => {
                    if let Some(list) = parent_list_mut(blocks, &path) {
                        list.kind = kind;
                    }
                    Some(path.clone())
                }
                None => None,
            }
        };

        if let Some(new_path) = new_path {
            self.place_cursor(&new_path, local);
        }
    }

    fn indent(&mut self, at: usize) -> Result<(), EditError> {
        let (path, local) = self.item_at(at)?;
        if let Some(new_path) = indent_item(self.blocks.to_mut(), &path) {
            self.place_cursor(&new_path, local);
        }
        Ok(())
    }

    fn outdent(&mut self, at: usize) -> Result<(), EditError> {
        let (path, local) = self.item_at(at)?;
        if let Some(new_path) = outdent_item(self.blocks.to_mut(), &path) {
            self.place_cursor(&new_path, local);
        }
        Ok(())
    }

    /// Path and local offset of the list item containing `at`
    fn item_at(&self, at: usize) -> Result<(Vec<usize>, usize), EditError> {
        let spans = layout(&self.blocks);
        let (index, local) = position(&spans, at);
        spans
            .get(index)
            .filter(|span| span.path.len() >= 2)
            .map(|span| (span.path.clone(), local))
            .ok_or(EditError::NotInList(at))
    }

    /// Collapse the selection onto `local` inside the block at `path`
    fn place_cursor(&mut self, path: &[usize], local: usize) {
        let spans = layout(&self.blocks);
        if let Some(span) = spans.iter().find(|span| span.path == path) {
            let offset = span.start + local.min(span.len);
            self.selection = offset..offset;
        }
    }
}

fn shift_for_insert(selection: &Range<usize>, at: usize, inserted: usize) -> Range<usize> {
    if at <= selection.start {
        selection.start + inserted..selection.end + inserted
    } else if at < selection.end {
        selection.start..selection.end + inserted
    } else {
        selection.clone()
    }
}

fn shift_for_delete(selection: &Range<usize>, deleted: &Range<usize>) -> Range<usize> {
    let removed = deleted.end - deleted.start;
    if deleted.end <= selection.start {
        selection.start - removed..selection.end - removed
    } else if deleted.start >= selection.end {
        selection.clone()
    } else {
        deleted.start..deleted.start
    }
}

/// Indices of the spans touched by `range`
fn touched(spans: &[TextSpan], range: &Range<usize>) -> RangeInclusive<usize> {
    let (first, _) = position(spans, range.start);
    let (last, _) = position(spans, range.end);
    first..=last
}

/// Remove one text block. A removed list item's children take its place.
fn remove_text_block(blocks: &mut Vec<Block>, path: &[usize]) {
    if let [block] = path {
        if *block < blocks.len() {
            blocks.remove(*block);
        }
        return;
    }
    let Some(&index) = path.last() else {
        return;
    };
    let Some(list) = parent_list_mut(blocks, path) else {
        return;
    };
    if index >= list.items.len() {
        return;
    }
    let removed = list.items.remove(index);
    if let Some(children) = removed.children {
        list.items.splice(index..index, children.items);
    }
}

/// Replace a paragraph or heading with a single-item list, merging it into
/// neighbouring lists of the same kind. Returns the new item path.
fn wrap_in_list(blocks: &mut Vec<Block>, block: usize, kind: ListKind) -> Vec<usize> {
    let content = match &mut blocks[block] {
        Block::Paragraph(content) | Block::Heading { content, .. } => std::mem::take(content),
        Block::List(_) => return vec![block],
    };
    blocks[block] = Block::List(List {
        kind,
        items: vec![ListItem::new(content)],
    });

    let mut block = block;
    let mut item = 0;
    if block > 0
        && let Some(offset) = merge_with_next(blocks, block - 1)
    {
        block -= 1;
        item = offset;
    }
    merge_with_next(blocks, block);
    vec![block, item]
}

/// Merge the list at `index + 1` into the list at `index` when both are
/// lists of the same kind. Returns how many items the first list had.
fn merge_with_next(blocks: &mut Vec<Block>, index: usize) -> Option<usize> {
    let same_kind = matches!(
        (blocks.get(index), blocks.get(index + 1)),
        (Some(Block::List(first)), Some(Block::List(next))) if first.kind == next.kind
    );
    if !same_kind {
        return None;
    }
    let Block::List(next) = blocks.remove(index + 1) else {
        return None;
    };
    let Block::List(first) = &mut blocks[index] else {
        return None;
    };
    let offset = first.items.len();
    first.items.extend(next.items);
    Some(offset)
}

/// Nest an item under its previous sibling, or under the next sibling when
/// it is the first item. An only child stays put (`None`).
fn indent_item(blocks: &mut [Block], path: &[usize]) -> Option<Vec<usize>> {
    let (&index, parent) = path.split_last()?;
    let list = parent_list_mut(blocks, path)?;
    let kind = list.kind;

    if index > 0 {
        let item = list.items.remove(index);
        let target = list.items[index - 1]
            .children
            .get_or_insert_with(|| List::new(kind));
        target.items.push(item);
        let child = target.items.len() - 1;

        let mut new_path = parent.to_vec();
        new_path.extend([index - 1, child]);
        Some(new_path)
    } else if list.items.len() > 1 {
        let item = list.items.remove(0);
        list.items[0]
            .children
            .get_or_insert_with(|| List::new(kind))
            .items
            .insert(0, item);

        let mut new_path = parent.to_vec();
        new_path.extend([0, 0]);
        Some(new_path)
    } else {
        None
    }
}

/// Move an item one level up.
///
/// A nested item lands right after its parent item and adopts its following
/// siblings as children, so the text order is unchanged. A top-level item
/// becomes a paragraph, splitting its list in two; its own children start
/// the second half.
fn outdent_item(blocks: &mut Vec<Block>, path: &[usize]) -> Option<Vec<usize>> {
    let (&index, parent) = path.split_last()?;

    if let [block] = parent {
        let block = *block;
        let Block::List(list) = &mut blocks[block] else {
            return None;
        };
        let kind = list.kind;
        let mut after = list.items.split_off(index);
        if after.is_empty() {
            return None;
        }
        let item = after.remove(0);
        let before = std::mem::take(&mut list.items);

        let mut rest = item.children.map(|children| children.items).unwrap_or_default();
        rest.extend(after);

        let mut replacement = Vec::new();
        if !before.is_empty() {
            replacement.push(Block::List(List {
                kind,
                items: before,
            }));
        }
        let paragraph = block + replacement.len();
        replacement.push(Block::Paragraph(item.content));
        if !rest.is_empty() {
            replacement.push(Block::List(List { kind, items: rest }));
        }
        blocks.splice(block..=block, replacement);
        return Some(vec![paragraph]);
    }

    let parent_item = item_at_mut(blocks, parent)?;
    let sublist = parent_item.children.as_mut()?;
    let kind = sublist.kind;
    let mut moved = sublist.items.split_off(index);
    if moved.is_empty() {
        return None;
    }
    let mut item = moved.remove(0);
    if !moved.is_empty() {
        item.children
            .get_or_insert_with(|| List::new(kind))
            .items
            .extend(moved);
    }

    let &parent_index = parent.last()?;
    parent_list_mut(blocks, parent)?
        .items
        .insert(parent_index + 1, item);

    let mut new_path = parent.to_vec();
    *new_path.last_mut()? = parent_index + 1;
    Some(new_path)
}
