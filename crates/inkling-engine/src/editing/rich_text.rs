use std::ops::Range;

/// Inline styles that can be toggled on a run of text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InlineStyle {
    Bold,
    Italic,
    Underline,
}

/// The set of inline styles applied to a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Style {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl Style {
    pub fn has(&self, style: InlineStyle) -> bool {
        match style {
            InlineStyle::Bold => self.bold,
            InlineStyle::Italic => self.italic,
            InlineStyle::Underline => self.underline,
        }
    }

    pub fn with(mut self, style: InlineStyle, on: bool) -> Self {
        match style {
            InlineStyle::Bold => self.bold = on,
            InlineStyle::Italic => self.italic = on,
            InlineStyle::Underline => self.underline = on,
        }
        self
    }

    pub fn toggled(self, style: InlineStyle) -> Self {
        let on = !self.has(style);
        self.with(style, on)
    }
}

/// A run of text sharing one style. `\n` inside a run is a hard line break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub style: Style,
}

impl Run {
    pub fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Styled inline content of one text block.
///
/// Runs are kept normalized: no empty runs and no two neighbours with the
/// same style, so two `RichText` values with the same characters and
/// styling always compare equal. Non-breaking spaces are stored as plain
/// spaces, matching how markup is read back. All offsets are in `char`s.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RichText {
    runs: Vec<Run>,
}

impl RichText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::from_runs(vec![Run::new(text, Style::default())])
    }

    pub fn from_runs(runs: Vec<Run>) -> Self {
        let mut text = Self { runs };
        text.normalize();
        text
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Length in chars
    pub fn len(&self) -> usize {
        self.runs.iter().map(Run::char_len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn to_plain(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    pub fn ends_with_newline(&self) -> bool {
        self.runs
            .last()
            .is_some_and(|run| run.text.ends_with('\n'))
    }

    /// Append text at the end with the given style
    pub fn push(&mut self, text: &str, style: Style) {
        if text.is_empty() {
            return;
        }
        let text = plain_spaces(text);
        match self.runs.last_mut() {
            Some(last) if last.style == style => last.text.push_str(&text),
            _ => self.runs.push(Run::new(text, style)),
        }
    }

    /// Style that text typed at `offset` should inherit: the style of the
    /// preceding char, or of the first char when typing at the start.
    pub fn style_before(&self, offset: usize) -> Style {
        if offset == 0 {
            return self.runs.first().map(|run| run.style).unwrap_or_default();
        }
        let mut start = 0;
        for run in &self.runs {
            let end = start + run.char_len();
            if offset <= end {
                return run.style;
            }
            start = end;
        }
        self.runs.last().map(|run| run.style).unwrap_or_default()
    }

    pub fn insert(&mut self, offset: usize, text: &str, style: Style) {
        if text.is_empty() {
            return;
        }
        let index = self.split_at(offset);
        self.runs.insert(index, Run::new(text, style));
        self.normalize();
    }

    pub fn delete(&mut self, range: Range<usize>) {
        let (first, last) = self.split_range(range);
        if first < last {
            self.runs.drain(first..last);
            self.normalize();
        }
    }

    /// Flip `style` on every char in `range`
    pub fn toggle(&mut self, range: Range<usize>, style: InlineStyle) {
        let (first, last) = self.split_range(range);
        for run in &mut self.runs[first..last] {
            run.style = run.style.toggled(style);
        }
        self.normalize();
    }

    /// Split at `offset`, keeping the head and returning the tail
    pub fn split_off(&mut self, offset: usize) -> RichText {
        let index = self.split_at(offset);
        let tail = RichText::from_runs(self.runs.split_off(index));
        self.normalize();
        tail
    }

    pub fn append(&mut self, other: RichText) {
        self.runs.extend(other.runs);
        self.normalize();
    }

    fn split_range(&mut self, range: Range<usize>) -> (usize, usize) {
        let len = self.len();
        let start = range.start.min(len);
        let end = range.end.min(len).max(start);
        let first = self.split_at(start);
        let last = self.split_at(end);
        (first, last)
    }

    /// Ensure a run boundary at `offset` and return the index of the run
    /// starting there (or `runs.len()` at the end).
    fn split_at(&mut self, offset: usize) -> usize {
        let mut start = 0;
        for index in 0..self.runs.len() {
            if offset == start {
                return index;
            }
            let len = self.runs[index].char_len();
            if offset < start + len {
                let at = byte_index(&self.runs[index].text, offset - start);
                let tail = self.runs[index].text.split_off(at);
                let style = self.runs[index].style;
                self.runs.insert(index + 1, Run::new(tail, style));
                return index + 1;
            }
            start += len;
        }
        self.runs.len()
    }

    fn normalize(&mut self) {
        let mut merged: Vec<Run> = Vec::with_capacity(self.runs.len());
        for mut run in self.runs.drain(..) {
            if run.text.is_empty() {
                continue;
            }
            if run.text.contains(NBSP) {
                run.text = plain_spaces(&run.text);
            }
            match merged.last_mut() {
                Some(last) if last.style == run.style => last.text.push_str(&run.text),
                _ => merged.push(run),
            }
        }
        self.runs = merged;
    }
}

const NBSP: char = '\u{a0}';

/// Replace non-breaking spaces with ordinary ones, one char for one
fn plain_spaces(text: &str) -> String {
    text.replace(NBSP, " ")
}

/// Byte index of the `char_offset`-th char, clamped to the end
pub(crate) fn byte_index(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bold() -> Style {
        Style::default().with(InlineStyle::Bold, true)
    }

    #[test]
    fn test_insert_splits_run() {
        let mut text = RichText::plain("helo");
        text.insert(3, "l", bold());

        assert_eq!(
            text.runs(),
            &[
                Run::new("hel", Style::default()),
                Run::new("l", bold()),
                Run::new("o", Style::default()),
            ]
        );
        assert_eq!(text.to_plain(), "hello");
    }

    #[test]
    fn test_insert_with_same_style_merges() {
        let mut text = RichText::plain("hllo");
        text.insert(1, "e", Style::default());

        assert_eq!(text.runs().len(), 1);
        assert_eq!(text.to_plain(), "hello");
    }

    #[test]
    fn test_non_breaking_spaces_become_plain() {
        let mut text = RichText::plain("a\u{a0}b");
        text.insert(1, "\u{a0}", bold());
        text.push("\u{a0}", Style::default());

        assert_eq!(text.to_plain(), "a  b ");
        assert_eq!(text.len(), 5);
    }

    #[test]
    fn test_offsets_are_chars_not_bytes() {
        let mut text = RichText::plain("héllo 🦀");
        text.insert(2, "X", Style::default());
        assert_eq!(text.to_plain(), "héXllo 🦀");

        text.delete(7..8);
        assert_eq!(text.to_plain(), "héXllo ");
        assert_eq!(text.len(), 7);
    }

    #[test]
    fn test_delete_across_runs() {
        let mut text = RichText::from_runs(vec![
            Run::new("ab", Style::default()),
            Run::new("cd", bold()),
            Run::new("ef", Style::default()),
        ]);
        text.delete(1..5);

        assert_eq!(text.runs(), &[Run::new("af", Style::default())]);
    }

    #[test]
    fn test_delete_out_of_range_is_clamped() {
        let mut text = RichText::plain("abc");
        text.delete(2..10);
        assert_eq!(text.to_plain(), "ab");
    }

    #[test]
    fn test_toggle_twice_restores_runs() {
        let original = RichText::from_runs(vec![
            Run::new("plain ", Style::default()),
            Run::new("strong", bold()),
            Run::new(" tail", Style::default()),
        ]);

        let mut text = original.clone();
        text.toggle(3..9, InlineStyle::Bold);
        assert_ne!(text, original);

        text.toggle(3..9, InlineStyle::Bold);
        assert_eq!(text, original);
    }

    #[test]
    fn test_split_off_and_append_round_trip() {
        let original = RichText::from_runs(vec![
            Run::new("one ", Style::default()),
            Run::new("two", bold()),
        ]);

        let mut head = original.clone();
        let tail = head.split_off(5);
        assert_eq!(head.to_plain(), "one t");
        assert_eq!(tail.to_plain(), "wo");
        assert_eq!(tail.runs()[0].style, bold());

        head.append(tail);
        assert_eq!(head, original);
    }

    #[test]
    fn test_style_before() {
        let text = RichText::from_runs(vec![
            Run::new("ab", bold()),
            Run::new("cd", Style::default()),
        ]);

        assert_eq!(text.style_before(0), bold());
        assert_eq!(text.style_before(2), bold());
        assert_eq!(text.style_before(3), Style::default());
        assert_eq!(RichText::new().style_before(0), Style::default());
    }
}
