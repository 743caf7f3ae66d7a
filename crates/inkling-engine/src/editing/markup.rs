//! HTML-like markup reader and writer for note bodies.
//!
//! The reader is lenient: it accepts the markup produced by browser
//! `contenteditable` regions (unclosed `<br>`, `&nbsp;`, stray inline text
//! between blocks) and ignores tags it doesn't understand while keeping
//! their text. The writer emits one canonical form, so
//! `serialize(parse(serialize(blocks))) == serialize(blocks)`.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::editing::document::{Block, List, ListItem, ListKind};
use crate::editing::{InlineStyle, RichText, Style};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarkupError {
    #[error("malformed markup at byte {position}: {reason}")]
    Malformed { position: u64, reason: String },
}

const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "meta", "link", "wbr"];

const CONTAINER_TAGS: &[&str] = &[
    "p",
    "div",
    "blockquote",
    "pre",
    "section",
    "article",
    "li",
];

const DASH_LIST_CLASS: &str = "dash-list";

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Element {
        name: String,
        class: Option<String>,
        children: Vec<Node>,
    },
    Text(String),
}

struct OpenElement {
    name: String,
    class: Option<String>,
    children: Vec<Node>,
}

impl OpenElement {
    fn into_node(self) -> Node {
        Node::Element {
            name: self.name,
            class: self.class,
            children: self.children,
        }
    }
}

/// Parse markup into blocks. Returns an empty vec for empty input.
pub fn parse(input: &str) -> Result<Vec<Block>, MarkupError> {
    let nodes = parse_tree(input)?;
    let mut builder = BlockBuilder::default();
    for node in &nodes {
        builder.node(node);
    }
    builder.flush();
    Ok(builder.blocks)
}

fn parse_tree(input: &str) -> Result<Vec<Node>, MarkupError> {
    let mut reader = Reader::from_str(input);
    {
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
    }

    let mut stack: Vec<OpenElement> = Vec::new();
    let mut root: Vec<Node> = Vec::new();

    loop {
        let event = reader.read_event().map_err(|error| MarkupError::Malformed {
            position: reader.buffer_position() as u64,
            reason: error.to_string(),
        })?;

        match event {
            Event::Start(tag) => {
                let (name, class) = element_info(&tag);
                if VOID_TAGS.contains(&name.as_str()) {
                    push_node(&mut stack, &mut root, element(name, class));
                } else {
                    stack.push(OpenElement {
                        name,
                        class,
                        children: Vec::new(),
                    });
                }
            }
            Event::Empty(tag) => {
                let (name, class) = element_info(&tag);
                push_node(&mut stack, &mut root, element(name, class));
            }
            Event::End(tag) => {
                let name = String::from_utf8_lossy(tag.name().as_ref()).to_ascii_lowercase();
                // Close everything up to the matching element; ignore
                // end tags with no open counterpart
                if let Some(depth) = stack.iter().rposition(|open| open.name == name) {
                    while stack.len() > depth {
                        if let Some(open) = stack.pop() {
                            push_node(&mut stack, &mut root, open.into_node());
                        }
                    }
                }
            }
            Event::Text(text) => {
                let raw = String::from_utf8_lossy(&text);
                let decoded = html_escape::decode_html_entities(&raw);
                let preformatted = stack.iter().any(|open| open.name == "pre");
                push_node(
                    &mut stack,
                    &mut root,
                    Node::Text(clean_text(&decoded, preformatted)),
                );
            }
            Event::CData(data) => {
                let raw = String::from_utf8_lossy(&data);
                push_node(&mut stack, &mut root, Node::Text(clean_text(&raw, false)));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    while let Some(open) = stack.pop() {
        push_node(&mut stack, &mut root, open.into_node());
    }

    Ok(root)
}

fn element(name: String, class: Option<String>) -> Node {
    Node::Element {
        name,
        class,
        children: Vec::new(),
    }
}

fn element_info(tag: &BytesStart) -> (String, Option<String>) {
    let name = String::from_utf8_lossy(tag.name().as_ref()).to_ascii_lowercase();
    let class = tag
        .html_attributes()
        .flatten()
        .find(|attribute| attribute.key.as_ref().eq_ignore_ascii_case(b"class"))
        .map(|attribute| String::from_utf8_lossy(&attribute.value).into_owned());
    (name, class)
}

fn push_node(stack: &mut [OpenElement], root: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => root.push(node),
    }
}

/// Source newlines are layout, not content, outside `<pre>`
fn clean_text(text: &str, preformatted: bool) -> String {
    let text = text.replace('\u{a0}', " ").replace("\r\n", "\n");
    if preformatted {
        text
    } else {
        text.replace('\n', " ")
    }
}

fn heading_level(name: &str) -> Option<u8> {
    name.strip_prefix('h')
        .and_then(|level| level.parse::<u8>().ok())
        .filter(|level| (1..=6).contains(level))
}

fn is_list(name: &str) -> bool {
    name == "ul" || name == "ol"
}

fn is_block(name: &str) -> bool {
    CONTAINER_TAGS.contains(&name) || is_list(name) || heading_level(name).is_some()
}

#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    /// Inline content not yet inside any block
    pending: RichText,
}

impl BlockBuilder {
    fn node(&mut self, node: &Node) {
        match node {
            Node::Element {
                name,
                class,
                children,
            } if is_block(name) => {
                self.flush();
                if let Some(level) = heading_level(name) {
                    self.blocks.push(Block::Heading {
                        level,
                        content: inline_content(children),
                    });
                } else if is_list(name) {
                    self.blocks
                        .push(Block::List(build_list(name, class.as_deref(), children)));
                } else {
                    self.container(children);
                }
            }
            other => collect_inline(other, Style::default(), &mut self.pending),
        }
    }

    /// A paragraph-like element. Produces at least one block, even when empty.
    fn container(&mut self, children: &[Node]) {
        let start = self.blocks.len();
        for child in children {
            self.node(child);
        }
        if self.blocks.len() == start {
            let content = std::mem::take(&mut self.pending);
            self.blocks.push(Block::Paragraph(trim_trailing_break(content)));
        } else {
            self.flush();
        }
    }

    /// Turn pending inline content into a paragraph. Whitespace-only
    /// content between blocks is formatting and gets dropped.
    fn flush(&mut self) {
        let content = std::mem::take(&mut self.pending);
        if !content.to_plain().trim().is_empty() {
            self.blocks.push(Block::Paragraph(trim_trailing_break(content)));
        }
    }
}

fn build_list(name: &str, class: Option<&str>, children: &[Node]) -> List {
    let kind = if name == "ol" {
        ListKind::Ordered
    } else if class.is_some_and(|class| class.split_whitespace().any(|c| c == DASH_LIST_CLASS)) {
        ListKind::Dash
    } else {
        ListKind::Bullet
    };

    let mut list = List::new(kind);
    for child in children {
        match child {
            Node::Element {
                name, children, ..
            } if name == "li" => list.items.push(list_item(children)),
            Node::Element {
                name: nested_name,
                class,
                children,
            } if is_list(nested_name) => {
                // A list directly inside a list belongs to the previous item
                let nested = build_list(nested_name, class.as_deref(), children);
                match list.items.last_mut() {
                    Some(previous) => adopt(previous, nested),
                    None => list.items.push(ListItem {
                        content: RichText::new(),
                        children: Some(nested),
                    }),
                }
            }
            Node::Text(text) if text.trim().is_empty() => {}
            other => {
                let mut content = RichText::new();
                collect_inline(other, Style::default(), &mut content);
                list.items.push(ListItem::new(trim_trailing_break(content)));
            }
        }
    }
    list
}

fn adopt(item: &mut ListItem, nested: List) {
    match &mut item.children {
        Some(existing) => existing.items.extend(nested.items),
        None => item.children = Some(nested),
    }
}

fn list_item(children: &[Node]) -> ListItem {
    let mut item = ListItem::new(RichText::new());
    for child in children {
        match child {
            Node::Element {
                name,
                class,
                children,
            } if is_list(name) => adopt(&mut item, build_list(name, class.as_deref(), children)),
            Node::Text(text) if item.children.is_some() && text.trim().is_empty() => {}
            other => collect_inline(other, Style::default(), &mut item.content),
        }
    }
    item.content = trim_trailing_break(item.content);
    item
}

fn inline_content(children: &[Node]) -> RichText {
    let mut content = RichText::new();
    for child in children {
        collect_inline(child, Style::default(), &mut content);
    }
    trim_trailing_break(content)
}

fn collect_inline(node: &Node, style: Style, out: &mut RichText) {
    match node {
        Node::Text(text) => out.push(text, style),
        Node::Element { name, children, .. } => {
            if name == "br" {
                out.push("\n", style);
                return;
            }
            let style = match name.as_str() {
                "b" | "strong" => style.with(InlineStyle::Bold, true),
                "i" | "em" => style.with(InlineStyle::Italic, true),
                "u" => style.with(InlineStyle::Underline, true),
                _ => style,
            };
            for child in children {
                collect_inline(child, style, out);
            }
        }
    }
}

/// A trailing `<br>` only makes an empty last line visible in a browser;
/// it is not content.
fn trim_trailing_break(mut content: RichText) -> RichText {
    if content.ends_with_newline() {
        let len = content.len();
        content.delete(len - 1..len);
    }
    content
}

/// Write blocks in canonical form. A document holding nothing but one
/// empty paragraph serializes to the empty string.
pub fn serialize(blocks: &[Block]) -> String {
    if let [Block::Paragraph(content)] = blocks
        && content.is_empty()
    {
        return String::new();
    }

    let mut out = String::new();
    for block in blocks {
        match block {
            Block::Paragraph(content) => {
                out.push_str("<p>");
                write_inline(content, &mut out);
                out.push_str("</p>");
            }
            Block::Heading { level, content } => {
                out.push_str(&format!("<h{level}>"));
                write_inline(content, &mut out);
                out.push_str(&format!("</h{level}>"));
            }
            Block::List(list) => write_list(list, &mut out),
        }
    }
    out
}

fn write_list(list: &List, out: &mut String) {
    let (open, close) = match list.kind {
        ListKind::Bullet => ("<ul>", "</ul>"),
        ListKind::Ordered => ("<ol>", "</ol>"),
        ListKind::Dash => ("<ul class=\"dash-list\">", "</ul>"),
    };
    out.push_str(open);
    for item in &list.items {
        out.push_str("<li>");
        write_inline(&item.content, out);
        if let Some(children) = &item.children {
            write_list(children, out);
        }
        out.push_str("</li>");
    }
    out.push_str(close);
}

fn write_inline(content: &RichText, out: &mut String) {
    for run in content.runs() {
        if run.style.bold {
            out.push_str("<strong>");
        }
        if run.style.italic {
            out.push_str("<em>");
        }
        if run.style.underline {
            out.push_str("<u>");
        }
        for (index, line) in run.text.split('\n').enumerate() {
            if index > 0 {
                out.push_str("<br>");
            }
            out.push_str(&html_escape::encode_text(line));
        }
        if run.style.underline {
            out.push_str("</u>");
        }
        if run.style.italic {
            out.push_str("</em>");
        }
        if run.style.bold {
            out.push_str("</strong>");
        }
    }
    if content.ends_with_newline() {
        out.push_str("<br>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::Run;
    use pretty_assertions::assert_eq;

    fn para(text: &str) -> Block {
        Block::Paragraph(RichText::plain(text))
    }

    fn round_trip(markup: &str) -> String {
        serialize(&parse(markup).unwrap())
    }

    // ============ Reader tests ============

    #[test]
    fn test_parse_paragraphs_and_headings() {
        let blocks = parse("<h1>Title</h1><p>Body text</p>").unwrap();

        assert_eq!(
            blocks,
            vec![
                Block::Heading {
                    level: 1,
                    content: RichText::plain("Title"),
                },
                para("Body text"),
            ]
        );
    }

    #[test]
    fn test_parse_inline_styles_and_entities() {
        let blocks = parse("<p>a <b>bold</b> &amp; <em><u>both</u></em>&nbsp;</p>").unwrap();

        let bold = Style::default().with(InlineStyle::Bold, true);
        let italic_underline = Style::default()
            .with(InlineStyle::Italic, true)
            .with(InlineStyle::Underline, true);
        assert_eq!(
            blocks,
            vec![Block::Paragraph(RichText::from_runs(vec![
                Run::new("a ", Style::default()),
                Run::new("bold", bold),
                Run::new(" & ", Style::default()),
                Run::new("both", italic_underline),
                Run::new(" ", Style::default()),
            ]))]
        );
    }

    #[test]
    fn test_parse_browser_style_lines() {
        // What a contenteditable div produces after typing a few lines
        let blocks = parse("first<div>second</div><div><br></div>").unwrap();

        assert_eq!(blocks, vec![para("first"), para("second"), para("")]);
    }

    #[test]
    fn test_parse_nested_lists() {
        let blocks = parse(
            "<ul class=\"dash-list\">\n  <li>one<ul><li>nested</li></ul></li>\n  <li>two</li>\n</ul><ol><li>first</li></ol>",
        )
        .unwrap();

        assert_eq!(
            blocks,
            vec![
                Block::List(List {
                    kind: ListKind::Dash,
                    items: vec![
                        ListItem {
                            content: RichText::plain("one"),
                            children: Some(List {
                                kind: ListKind::Bullet,
                                items: vec![ListItem::new(RichText::plain("nested"))],
                            }),
                        },
                        ListItem::new(RichText::plain("two")),
                    ],
                }),
                Block::List(List {
                    kind: ListKind::Ordered,
                    items: vec![ListItem::new(RichText::plain("first"))],
                }),
            ]
        );
    }

    #[test]
    fn test_list_directly_inside_list_attaches_to_previous_item() {
        let blocks = parse("<ul><li>a</li><ul><li>b</li></ul></ul>").unwrap();

        assert_eq!(
            blocks,
            vec![Block::List(List {
                kind: ListKind::Bullet,
                items: vec![ListItem {
                    content: RichText::plain("a"),
                    children: Some(List {
                        kind: ListKind::Bullet,
                        items: vec![ListItem::new(RichText::plain("b"))],
                    }),
                }],
            })]
        );
    }

    #[test]
    fn test_unknown_and_unmatched_tags_are_tolerated() {
        let blocks = parse("<p>keep <span>this</span></b> text<p>next").unwrap();

        assert_eq!(blocks, vec![para("keep this text"), para("next")]);
    }

    #[test]
    fn test_hard_breaks() {
        let blocks = parse("<p>line one<br>line two<br><br></p>").unwrap();
        assert_eq!(blocks, vec![para("line one\nline two\n")]);
    }

    #[test]
    fn test_malformed_markup_is_an_error() {
        let result = parse("<p>unterminated</p");
        assert!(matches!(result, Err(MarkupError::Malformed { .. })));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse("").unwrap(), vec![]);
        assert_eq!(parse("  \n ").unwrap(), vec![]);
    }

    // ============ Writer tests ============

    #[test]
    fn test_serialize_canonical_form() {
        let blocks = parse(
            "<H2>Plan</H2><ul class='dash-list'><li><b>bold</b> &lt;tag&gt;<ol><li>x</li></ol></li></ul><p>a<br>b</p>",
        )
        .unwrap();

        insta::assert_snapshot!(
            serialize(&blocks),
            @r#"<h2>Plan</h2><ul class="dash-list"><li><strong>bold</strong> &lt;tag&gt;<ol><li>x</li></ol></li></ul><p>a<br>b</p>"#
        );
    }

    #[test]
    fn test_serialize_overlapping_styles() {
        let bold = Style::default().with(InlineStyle::Bold, true);
        let blocks = vec![Block::Paragraph(RichText::from_runs(vec![
            Run::new("b", bold),
            Run::new("bi", bold.with(InlineStyle::Italic, true)),
        ]))];

        insta::assert_snapshot!(
            serialize(&blocks),
            @"<p><strong>b</strong><strong><em>bi</em></strong></p>"
        );
    }

    #[test]
    fn test_single_empty_paragraph_is_empty_string() {
        assert_eq!(serialize(&[Block::Paragraph(RichText::new())]), "");
        assert_eq!(
            serialize(&[para(""), para("")]),
            "<p></p><p></p>"
        );
    }

    #[test]
    fn test_canonical_form_is_stable() {
        for markup in [
            "<p>plain</p>",
            "<p></p><p></p>",
            "<p>ends with break<br><br></p>",
            "<p> spaced </p>",
            "<h3><u>under</u></h3>",
            "<ol><li></li><li>b<ul><li>c</li></ul></li></ol>",
        ] {
            let once = round_trip(markup);
            assert_eq!(once, markup, "first pass of {markup}");
            assert_eq!(round_trip(&once), once, "second pass of {markup}");
        }
    }
}
