use inkling_engine::{
    Block, Cmd, Document, Editor, InlineStyle, Key, List, ListItem, ListKind, RichText,
    Suggestion,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

const SAMPLE: &str = "<h1>Groceries</h1>\
<p>Things to buy <strong>today</strong>:</p>\
<ul><li>eggs<ul><li>free range</li></ul></li><li><em>milk</em></li></ul>\
<ol><li>bakery</li><li>butcher</li></ol>";

#[test]
fn markup_round_trips_losslessly() {
    let doc = Document::from_markup(SAMPLE).unwrap();
    let reparsed = Document::from_markup(&doc.markup()).unwrap();

    assert_eq!(doc.markup(), SAMPLE);
    assert_eq!(reparsed, doc);
}

#[test]
fn typed_non_breaking_space_survives_save_and_reopen() {
    let mut editor = Editor::default();
    for c in "a\u{a0}b".chars() {
        editor.handle_key(Key::Char(c));
    }
    let doc = editor.document().clone();
    let reopened = Document::from_markup(&doc.markup()).unwrap();

    assert_eq!(doc.text(), "a b");
    assert_eq!(doc.markup(), "<p>a b</p>");
    assert_eq!(reopened.blocks(), doc.blocks());
}

#[rstest]
#[case(InlineStyle::Bold, 0..9)]
#[case(InlineStyle::Italic, 10..24)]
#[case(InlineStyle::Underline, 3..30)]
fn toggling_twice_restores_the_document(#[case] style: InlineStyle, #[case] range: std::ops::Range<usize>) {
    let original = Document::from_markup(SAMPLE).unwrap();

    let mut doc = original.clone();
    for _ in 0..4 {
        doc = doc
            .apply(Cmd::ToggleStyle {
                range: range.clone(),
                style,
            })
            .unwrap();
    }

    assert_eq!(doc.blocks(), original.blocks());
    assert_eq!(doc.markup(), original.markup());
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(6)]
fn toggling_a_heading_twice_restores_the_paragraph(#[case] level: u8) {
    let original = Document::from_markup("<p>Title</p><p>body</p>").unwrap();

    let heading = original
        .apply(Cmd::ToggleHeading { range: 0..5, level })
        .unwrap();
    assert_eq!(
        heading.markup(),
        format!("<h{level}>Title</h{level}><p>body</p>")
    );

    let back = heading
        .apply(Cmd::ToggleHeading { range: 0..5, level })
        .unwrap();
    assert_eq!(back.blocks(), original.blocks());
}

#[test]
fn indenting_the_first_item_nests_it_under_the_second() {
    let doc = Document::from_markup("<ul><li>one</li><li>two</li><li>three</li></ul>").unwrap();

    let indented = doc.apply(Cmd::IndentItem { at: 0 }).unwrap();

    assert_eq!(
        indented.blocks(),
        &[Block::List(List {
            kind: ListKind::Bullet,
            items: vec![
                ListItem {
                    content: RichText::plain("two"),
                    children: Some(List {
                        kind: ListKind::Bullet,
                        items: vec![ListItem::new(RichText::plain("one"))],
                    }),
                },
                ListItem::new(RichText::plain("three")),
            ],
        })]
    );
    assert_eq!(
        indented.markup(),
        "<ul><li>two<ul><li>one</li></ul></li><li>three</li></ul>"
    );
}

#[test]
fn dismissing_a_suggestion_leaves_text_and_cursor() {
    let mut editor = Editor::new(Document::from_markup("<p>hello</p>").unwrap());
    let anchor = editor.document().cursor();
    assert!(editor.offer(Suggestion::new(" world", anchor)));

    let before_text = editor.document().text();
    let before_selection = editor.document().selection();
    editor.dismiss_suggestion();

    assert_eq!(editor.document().text(), before_text);
    assert_eq!(editor.document().selection(), before_selection);
}

#[test]
fn accepting_after_typing_hello() {
    let mut editor = Editor::default();
    for c in "hello".chars() {
        editor.handle_key(Key::Char(c));
    }
    let anchor = editor.document().cursor();
    editor.offer(Suggestion::new(" world", anchor));

    let outcome = editor.handle_key(Key::Tab);

    assert!(outcome.accepted);
    assert_eq!(editor.document().text(), "hello world");
    assert_eq!(editor.document().selection(), 11..11);
    assert_eq!(editor.document().markup(), "<p>hello world</p>");
}

#[test]
fn edits_never_mutate_the_source_document() {
    let original = Document::from_markup(SAMPLE).unwrap();
    let markup = original.markup();

    let _ = original
        .apply(Cmd::DeleteRange { range: 5..40 })
        .unwrap()
        .apply(Cmd::SplitBlock { at: 3 })
        .unwrap();

    assert_eq!(original.markup(), markup);
    assert_eq!(original.version(), 0);
}
