//! Persisted formats reproduce the document they were written from.

use blogtext_engine::{
    Block, Document, Inline, LanguagePolicy, List, ListItem, ListKind, Mark, MarkSet, TextRun,
    from_html, from_markdown, table_of_contents, to_html, to_markdown,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[derive(Debug, Clone, Copy)]
enum Format {
    Markdown,
    Html,
}

fn round_trip(doc: &Document, format: Format) -> Document {
    let policy = LanguagePolicy::default();
    match format {
        Format::Markdown => from_markdown(&to_markdown(doc), &policy),
        Format::Html => from_html(&to_html(doc), &policy),
    }
}

fn marks(list: &[Mark]) -> MarkSet {
    list.iter().copied().collect()
}

fn post() -> Vec<Block> {
    vec![
        Block::heading(2, vec![Inline::text("Why arenas")]),
        Block::paragraph(vec![
            Inline::text("Keys are "),
            Inline::marked("cheap", marks(&[Mark::Italic])),
            Inline::text(" to copy and "),
            Inline::marked("never", marks(&[Mark::Bold])),
            Inline::text(" dangle. Call "),
            Inline::marked("doc.get(key)", marks(&[Mark::Code])),
            Inline::text(" and read "),
            Inline::link(
                "https://doc.rust-lang.org/std/collections/struct.HashMap.html",
                vec![TextRun::plain("the docs")],
            ),
            Inline::text("."),
        ]),
        Block::heading(3, vec![Inline::text("Steps")]),
        Block::list(
            ListKind::Number,
            vec![
                ListItem::new(vec![Inline::text("Allocate")]),
                ListItem::new(vec![Inline::text("Link")]).with_nested(List::new(
                    ListKind::Bullet,
                    vec![
                        ListItem::new(vec![Inline::text("parent")]),
                        ListItem::new(vec![Inline::text("children")]),
                    ],
                )),
            ],
        ),
        Block::quote(vec![Inline::text("Indices are pointers you can serialize.")]),
        Block::code("typescript", "const a: number[] = [];\n\nfor (const x of a) {}"),
        Block::image("https://cdn.x/arena.png", "arena diagram"),
        Block::video("https://cdn.x/demo.webm"),
        Block::paragraph(vec![Inline::marked(
            "Fin",
            marks(&[Mark::Bold, Mark::Italic]),
        )]),
    ]
}

#[rstest]
#[case::markdown(Format::Markdown)]
#[case::html(Format::Html)]
fn blog_post_round_trips(#[case] format: Format) {
    let doc = Document::from_blocks(&post());
    assert_eq!(round_trip(&doc, format).to_blocks(), doc.to_blocks());
}

fn para(content: Vec<Inline>) -> Block {
    Block::paragraph(content)
}

#[rstest]
#[case::bang_before_link(para(vec![
    Inline::text("Wow!"),
    Inline::link("https://x.com", vec![TextRun::plain("docs")]),
]))]
#[case::punctuation_before_closing_bold(para(vec![
    Inline::marked("a.", marks(&[Mark::Bold])),
    Inline::text("b"),
]))]
#[case::punctuation_after_opening_bold(para(vec![
    Inline::text("a"),
    Inline::marked(".b", marks(&[Mark::Bold])),
]))]
#[case::parenthesized_italic_inside_a_word(para(vec![
    Inline::text("a"),
    Inline::marked("(b)", marks(&[Mark::Italic])),
    Inline::text("c"),
]))]
#[case::repeated_spaces(para(vec![Inline::text("a  b")]))]
#[case::leading_spaces(para(vec![Inline::text("  indented")]))]
#[case::trailing_space(para(vec![Inline::text("end ")]))]
#[case::spaces_around_a_line_break(para(vec![Inline::text("one \n  two")]))]
#[case::backslash_in_url(para(vec![
    Inline::text("see "),
    Inline::link(r"a\(b", vec![TextRun::plain("x")]),
]))]
#[case::unbalanced_parenthesis_in_url(para(vec![
    Inline::link("https://en.wikipedia.org/wiki/Rust_(", vec![TextRun::plain("rust")]),
]))]
#[case::backslash_in_image_source(Block::image(r"C:\img (1).png", "shot"))]
fn awkward_content_round_trips(
    #[case] block: Block,
    #[values(Format::Markdown, Format::Html)] format: Format,
) {
    let doc = Document::from_blocks(&[block]);
    assert_eq!(round_trip(&doc, format).to_blocks(), doc.to_blocks());
}

#[rstest]
#[case::markdown(Format::Markdown)]
#[case::html(Format::Html)]
fn empty_document_round_trips(#[case] format: Format) {
    let doc = Document::new();
    assert!(round_trip(&doc, format).is_empty());
}

#[test]
fn markdown_and_html_agree() {
    let doc = Document::from_blocks(&post());
    let policy = LanguagePolicy::default();

    let via_markdown = from_markdown(&to_markdown(&doc), &policy);
    let via_html = from_html(&to_html(&via_markdown), &policy);

    assert_eq!(via_html.to_blocks(), doc.to_blocks());
}

#[test]
fn toc_survives_persistence() {
    let doc = Document::from_blocks(&post());
    let reloaded = round_trip(&doc, Format::Markdown);

    let titles: Vec<_> = table_of_contents(&reloaded)
        .into_iter()
        .map(|entry| (entry.id, entry.level))
        .collect();
    assert_eq!(
        titles,
        vec![("why-arenas".to_string(), 2), ("steps".to_string(), 3)]
    );
}

#[test]
fn persisted_markdown_shape() {
    let doc = Document::from_blocks(&post()[2..6]);
    insta::assert_snapshot!(to_markdown(&doc).trim_end(), @r"
    ### Steps

    1. Allocate
    2. Link
       - parent
       - children

    > Indices are pointers you can serialize.

    ```typescript
    const a: number[] = [];

    for (const x of a) {}
    ```
    ");
}
