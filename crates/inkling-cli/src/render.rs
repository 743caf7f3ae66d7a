//! Lays a document snapshot out as terminal lines, with the ghost
//! suggestion drawn at the caret.

use inkling_engine::{BlockKind, ListKind, RenderBlock, Snapshot, SuggestionState};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

pub struct DocumentLayout {
    pub lines: Vec<Line<'static>>,
    /// (row, column) of the caret inside `lines`
    pub caret: (u16, u16),
}

pub fn layout_document(snapshot: &Snapshot, suggestion: &SuggestionState) -> DocumentLayout {
    let ghost = match suggestion {
        SuggestionState::Shown { text, .. } => Some(text.replace('\n', " ")),
        SuggestionState::None => None,
    };

    let mut lines = Vec::new();
    let mut caret = (0, 0);

    for block in &snapshot.blocks {
        let prefix = block_prefix(block);
        let indent = " ".repeat(prefix.chars().count());
        let base = block_style(block.kind);
        let caret_at = (block.path == snapshot.cursor.path).then_some(snapshot.cursor.offset);

        let mut line = LineBuilder::new(&prefix, base);
        let mut local = 0;
        let mut place_caret = |line: &mut LineBuilder, row: usize, local: usize| {
            if caret_at == Some(local) {
                caret = (row as u16, line.width as u16);
                if let Some(ghost) = &ghost {
                    line.push_str(ghost, ghost_style());
                }
            }
        };

        for run in &block.runs {
            let style = base.patch(run_style(run));
            for c in run.text.chars() {
                place_caret(&mut line, lines.len(), local);
                if c == '\n' {
                    lines.push(line.finish());
                    line = LineBuilder::new(&indent, base);
                } else {
                    line.push(c, style);
                }
                local += 1;
            }
        }
        place_caret(&mut line, lines.len(), local);
        lines.push(line.finish());
    }

    DocumentLayout { lines, caret }
}

fn block_prefix(block: &RenderBlock) -> String {
    match block.kind {
        BlockKind::Paragraph => String::new(),
        BlockKind::Heading { level } => format!("{} ", "#".repeat(level as usize)),
        BlockKind::ListItem { kind, number } => {
            let indent = "  ".repeat(block.depth);
            match kind {
                ListKind::Bullet => format!("{indent}• "),
                ListKind::Dash => format!("{indent}- "),
                ListKind::Ordered => format!("{indent}{number}. "),
            }
        }
    }
}

fn block_style(kind: BlockKind) -> Style {
    match kind {
        BlockKind::Heading { .. } => Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
        _ => Style::default(),
    }
}

fn run_style(run: &inkling_engine::Run) -> Style {
    let mut style = Style::default();
    if run.style.bold {
        style = style.add_modifier(Modifier::BOLD);
    }
    if run.style.italic {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if run.style.underline {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    style
}

fn ghost_style() -> Style {
    Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::ITALIC)
}

/// Accumulates same-styled characters into spans
struct LineBuilder {
    spans: Vec<Span<'static>>,
    current: String,
    style: Style,
    width: usize,
}

impl LineBuilder {
    fn new(prefix: &str, style: Style) -> Self {
        Self {
            spans: Vec::new(),
            current: prefix.to_string(),
            style,
            width: prefix.chars().count(),
        }
    }

    fn push(&mut self, c: char, style: Style) {
        if style != self.style {
            self.flush();
            self.style = style;
        }
        self.current.push(c);
        self.width += 1;
    }

    fn push_str(&mut self, text: &str, style: Style) {
        for c in text.chars() {
            self.push(c, style);
        }
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.spans
                .push(Span::styled(std::mem::take(&mut self.current), self.style));
        }
    }

    fn finish(mut self) -> Line<'static> {
        self.flush();
        Line::from(self.spans)
    }
}
