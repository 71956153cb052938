//! Markdown → blocks.
//!
//! Media lines are recognized first (see [`transformers`](super::transformers));
//! everything between them goes through `pulldown-cmark` and a
//! [`MarkdownProcessor`] that folds the event stream into [`Block`]s.
//! Malformed input never fails the parse: whatever the parser cannot place
//! ends up as paragraph text.

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};

use crate::editing::heading_rule;
use crate::markdown::transformers::match_media_line;
use crate::models::blocks::{normalize_inlines, normalize_runs};
use crate::models::{Block, Inline, LanguagePolicy, List, ListItem, ListKind, Mark, MarkSet, TextRun};

/// Parse persisted Markdown into blocks, demoting out-of-range headings.
pub fn parse_markdown(content: &str, policy: &LanguagePolicy) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut chunk = String::new();
    let mut fence: Option<Fence> = None;

    for line in content.lines() {
        match &fence {
            Some(open) => {
                if Fence::parse(line).is_some_and(|close| close.closes(open)) {
                    fence = None;
                }
            }
            None => {
                if let Some(media) = match_media_line(line) {
                    flush_chunk(&mut chunk, policy, &mut blocks);
                    blocks.push(media);
                    continue;
                }
                fence = Fence::parse(line);
            }
        }
        chunk.push_str(line);
        chunk.push('\n');
    }
    flush_chunk(&mut chunk, policy, &mut blocks);

    let demoted = heading_rule::enforce_blocks(&mut blocks);
    if demoted > 0 {
        log::debug!("Demoted {demoted} out-of-range headings during Markdown import");
    }
    blocks
}

fn flush_chunk(chunk: &mut String, policy: &LanguagePolicy, blocks: &mut Vec<Block>) {
    if !chunk.trim().is_empty() {
        let mut processor = MarkdownProcessor::new(policy);
        for event in Parser::new(chunk) {
            processor.process_event(event);
        }
        blocks.extend(processor.finalize());
    }
    chunk.clear();
}

/// An opening or closing code fence line.
struct Fence {
    marker: char,
    len: usize,
    bare: bool,
}

impl Fence {
    fn parse(line: &str) -> Option<Self> {
        let rest = line.trim_start_matches(' ');
        if line.len() - rest.len() > 3 {
            return None;
        }
        let marker = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
        let len = rest.chars().take_while(|c| *c == marker).count();
        let info = &rest[len..];
        if len < 3 || (marker == '`' && info.contains('`')) {
            return None;
        }
        Some(Self {
            marker,
            len,
            bare: info.trim().is_empty(),
        })
    }

    fn closes(&self, open: &Fence) -> bool {
        self.bare && self.marker == open.marker && self.len >= open.len
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Leaf {
    Paragraph,
    Heading(u8),
}

/// Folds pulldown-cmark events into blocks.
///
/// Inline events accumulate in `inlines` until the enclosing leaf block
/// ends. Where that content lands depends on the context at that moment:
///
/// - inside a list item it is appended to the item (paragraphs joined by a
///   line break)
/// - inside a block quote each paragraph becomes its own Quote block
/// - otherwise it becomes a Paragraph or Heading
///
/// Tight list items carry no paragraph events at all, so their text is
/// flushed when the next block starts or the item ends.
struct MarkdownProcessor<'p> {
    policy: &'p LanguagePolicy,

    /// Completed top-level blocks
    blocks: Vec<Block>,

    /// Inline content of the leaf block being built
    inlines: Vec<Inline>,

    leaf: Option<Leaf>,

    /// Nesting depth of `**` and `_` spans; a run is bold while `strong > 0`
    strong: usize,
    emphasis: usize,

    /// URL and label runs of the link being built
    link: Option<(String, Vec<TextRun>)>,

    /// Source and alt text of the image being built
    image: Option<(String, String)>,
    image_depth: usize,

    /// Language and body of the fenced or indented code being built
    code: Option<(Option<String>, String)>,

    /// Raw HTML block being collected
    html: Option<String>,

    quote_depth: usize,

    list_parser: ListParser,
}

impl<'p> MarkdownProcessor<'p> {
    fn new(policy: &'p LanguagePolicy) -> Self {
        Self {
            policy,
            blocks: Vec::new(),
            inlines: Vec::new(),
            leaf: None,
            strong: 0,
            emphasis: 0,
            link: None,
            image: None,
            image_depth: 0,
            code: None,
            html: None,
            quote_depth: 0,
            list_parser: ListParser::default(),
        }
    }

    fn process_event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                if self.image_depth > 0 {
                    self.text(&code);
                } else {
                    let marks = self.marks().with(Mark::Code);
                    self.push_run(&code, marks);
                }
            }
            Event::Html(html) | Event::InlineHtml(html) => match &mut self.html {
                Some(buffer) => buffer.push_str(&html),
                None => self.text(&html),
            },
            Event::SoftBreak | Event::HardBreak => self.text("\n"),
            Event::Rule => {
                self.flush_loose_inlines();
                self.emit_leaf(Leaf::Paragraph, vec![Inline::text("---")]);
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Paragraph => {
                self.flush_loose_inlines();
                self.leaf = Some(Leaf::Paragraph);
            }
            Tag::Heading { level, .. } => {
                self.flush_loose_inlines();
                self.leaf = Some(Leaf::Heading(level as u8));
            }
            Tag::BlockQuote { .. } => {
                self.flush_loose_inlines();
                self.quote_depth += 1;
            }
            Tag::CodeBlock(kind) => {
                self.flush_loose_inlines();
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(|lang| lang.to_string()),
                    CodeBlockKind::Indented => None,
                };
                self.code = Some((language, String::new()));
            }
            Tag::HtmlBlock => {
                self.flush_loose_inlines();
                self.html = Some(String::new());
            }
            Tag::List(first) => {
                self.flush_loose_inlines();
                let kind = if first.is_some() {
                    ListKind::Number
                } else {
                    ListKind::Bullet
                };
                self.list_parser.start_list(kind);
            }
            Tag::Item => {
                self.flush_loose_inlines();
                self.list_parser.start_item();
            }
            Tag::Emphasis => self.emphasis += 1,
            Tag::Strong => self.strong += 1,
            Tag::Link { dest_url, .. } => {
                if self.image_depth == 0 {
                    self.link = Some((dest_url.to_string(), Vec::new()));
                }
            }
            Tag::Image { dest_url, .. } => {
                if self.image_depth == 0 {
                    self.image = Some((dest_url.to_string(), String::new()));
                }
                self.image_depth += 1;
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph | TagEnd::Heading { .. } => {
                let leaf = self.leaf.take().unwrap_or(Leaf::Paragraph);
                let inlines = std::mem::take(&mut self.inlines);
                self.emit_leaf(leaf, inlines);
            }
            TagEnd::BlockQuote { .. } => {
                self.flush_loose_inlines();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            TagEnd::CodeBlock => {
                if let Some((language, mut code)) = self.code.take() {
                    if code.ends_with('\n') {
                        code.pop();
                    }
                    self.emit_code(language, code);
                }
            }
            TagEnd::HtmlBlock => {
                if let Some(html) = self.html.take() {
                    let html = html.trim_end_matches('\n');
                    self.emit_leaf(Leaf::Paragraph, vec![Inline::text(html)]);
                }
            }
            TagEnd::List { .. } => {
                self.flush_loose_inlines();
                if let Some(list) = self.list_parser.end_list() {
                    self.blocks.push(Block::List(list));
                }
            }
            TagEnd::Item => {
                self.flush_loose_inlines();
                self.list_parser.end_item();
            }
            TagEnd::Emphasis => self.emphasis = self.emphasis.saturating_sub(1),
            TagEnd::Strong => self.strong = self.strong.saturating_sub(1),
            TagEnd::Link => {
                if self.image_depth == 0
                    && let Some((url, children)) = self.link.take()
                {
                    let children = normalize_runs(children);
                    if !children.is_empty() {
                        self.inlines.push(Inline::Link { url, children });
                    }
                }
            }
            TagEnd::Image => {
                self.image_depth = self.image_depth.saturating_sub(1);
                if self.image_depth == 0
                    && let Some((src, alt)) = self.image.take()
                {
                    self.finish_image(src, alt);
                }
            }
            _ => {}
        }
    }

    fn marks(&self) -> MarkSet {
        let mut marks = MarkSet::EMPTY;
        if self.strong > 0 {
            marks = marks.with(Mark::Bold);
        }
        if self.emphasis > 0 {
            marks = marks.with(Mark::Italic);
        }
        marks
    }

    fn text(&mut self, text: &str) {
        if let Some((_, code)) = &mut self.code {
            code.push_str(text);
        } else if let Some(html) = &mut self.html {
            html.push_str(text);
        } else if let Some((_, alt)) = &mut self.image {
            alt.push_str(text);
        } else {
            let marks = self.marks();
            self.push_run(text, marks);
        }
    }

    fn push_run(&mut self, text: &str, marks: MarkSet) {
        match &mut self.link {
            Some((_, children)) => children.push(TextRun::new(text, marks)),
            None => self.inlines.push(Inline::marked(text, marks)),
        }
    }

    /// A standalone image in a top-level paragraph or quote splits it; any
    /// other image is reduced to its alt text.
    fn finish_image(&mut self, src: String, alt: String) {
        let splits = self.link.is_none()
            && self.leaf == Some(Leaf::Paragraph)
            && !self.list_parser.is_in_item()
            && !src.trim().is_empty();
        if !splits {
            let marks = self.marks();
            self.push_run(&alt, marks);
            return;
        }

        let before = std::mem::take(&mut self.inlines);
        self.emit_leaf(Leaf::Paragraph, before);
        self.blocks.push(Block::image(src.trim(), alt));
    }

    /// Text that arrived outside any paragraph (tight list items).
    fn flush_loose_inlines(&mut self) {
        if self.leaf.is_none() && !self.inlines.is_empty() {
            let inlines = std::mem::take(&mut self.inlines);
            self.emit_leaf(Leaf::Paragraph, inlines);
        }
    }

    fn emit_leaf(&mut self, leaf: Leaf, inlines: Vec<Inline>) {
        let content = normalize_inlines(trim_line_breaks(inlines));
        if self.list_parser.is_in_item() {
            self.list_parser.add_content(content);
            return;
        }
        if self.quote_depth > 0 {
            if !content.is_empty() {
                self.blocks.push(Block::quote(content));
            }
            return;
        }
        match leaf {
            Leaf::Heading(level) => self.blocks.push(Block::heading(level, content)),
            Leaf::Paragraph if !content.is_empty() => self.blocks.push(Block::paragraph(content)),
            Leaf::Paragraph => {}
        }
    }

    fn emit_code(&mut self, language: Option<String>, code: String) {
        if self.list_parser.is_in_item() {
            self.list_parser.add_content(vec![Inline::text(code)]);
            return;
        }
        let language = self.policy.resolve(language.as_deref());
        self.blocks.push(Block::code(language, code));
    }

    fn finalize(mut self) -> Vec<Block> {
        self.flush_loose_inlines();
        let inlines = std::mem::take(&mut self.inlines);
        if let Some(leaf) = self.leaf.take() {
            self.emit_leaf(leaf, inlines);
        }
        while self.list_parser.is_parsing() {
            self.list_parser.end_item();
            if let Some(list) = self.list_parser.end_list() {
                self.blocks.push(Block::List(list));
            }
        }
        self.blocks
    }
}

/// Remove line breaks at the edges of a leaf's content; CommonMark never
/// produces them there, but splitting around an image can.
fn trim_line_breaks(mut inlines: Vec<Inline>) -> Vec<Inline> {
    if let Some(Inline::Text(first)) = inlines.first_mut() {
        first.text = first.text.trim_start_matches('\n').to_string();
    }
    if let Some(Inline::Text(last)) = inlines.last_mut() {
        last.text = last.text.trim_end_matches('\n').to_string();
    }
    inlines
}

/// Tracks nested lists while their items are still being built.
///
/// A nested list arrives between its parent item's own text and that
/// item's end, so finished lists attach to the item on top of
/// `item_stack` when there is one.
#[derive(Default)]
struct ListParser {
    list_stack: Vec<List>,
    item_stack: Vec<ListItem>,
}

impl ListParser {
    fn is_parsing(&self) -> bool {
        !self.list_stack.is_empty()
    }

    /// True while content belongs to an item rather than to the top level.
    fn is_in_item(&self) -> bool {
        !self.item_stack.is_empty()
    }

    fn start_list(&mut self, kind: ListKind) {
        self.list_stack.push(List::new(kind, Vec::new()));
    }

    fn start_item(&mut self) {
        self.item_stack.push(ListItem::new(Vec::new()));
    }

    fn add_content(&mut self, content: Vec<Inline>) {
        let Some(item) = self.item_stack.last_mut() else {
            return;
        };
        if content.is_empty() {
            return;
        }
        if !item.content.is_empty() {
            item.content.push(Inline::text("\n"));
        }
        item.content.extend(content);
    }

    fn end_item(&mut self) {
        if self.item_stack.len() < self.list_stack.len() {
            return;
        }
        let Some(mut item) = self.item_stack.pop() else {
            return;
        };
        item.content = normalize_inlines(std::mem::take(&mut item.content));
        if let Some(list) = self.list_stack.last_mut() {
            list.items.push(item);
        }
    }

    /// Close the innermost list. Returns it when it was a top-level list.
    fn end_list(&mut self) -> Option<List> {
        let list = self.list_stack.pop()?;
        match self.item_stack.last_mut() {
            Some(parent) => {
                match &mut parent.nested {
                    Some(existing) => existing.items.extend(list.items),
                    None => parent.nested = Some(list),
                }
                None
            }
            None => Some(list),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn parse(markdown: &str) -> Vec<Block> {
        parse_markdown(markdown, &LanguagePolicy::default())
    }

    fn bold() -> MarkSet {
        MarkSet::new().with(Mark::Bold)
    }

    #[test]
    fn title_paragraph_and_image() {
        let blocks = parse("# Title\n\nSome **bold** text.\n\n![alt text](http://x/img.png)\n");

        assert_eq!(
            blocks,
            vec![
                Block::heading(2, vec![Inline::text("Title")]),
                Block::paragraph(vec![
                    Inline::text("Some "),
                    Inline::marked("bold", bold()),
                    Inline::text(" text."),
                ]),
                Block::image("http://x/img.png", "alt text"),
            ]
        );
    }

    #[test]
    fn nested_lists_attach_to_their_item() {
        let blocks = parse("- one\n  1. sub\n- two\n");

        assert_eq!(
            blocks,
            vec![Block::list(
                ListKind::Bullet,
                vec![
                    ListItem::new(vec![Inline::text("one")]).with_nested(List::new(
                        ListKind::Number,
                        vec![ListItem::new(vec![Inline::text("sub")])],
                    )),
                    ListItem::new(vec![Inline::text("two")]),
                ],
            )]
        );
    }

    #[test]
    fn loose_item_paragraphs_join_with_a_line_break() {
        let blocks = parse("1. first\n\n   second\n");

        assert_eq!(
            blocks,
            vec![Block::list(
                ListKind::Number,
                vec![ListItem::new(vec![Inline::text("first\nsecond")])],
            )]
        );
    }

    #[test]
    fn each_quoted_paragraph_is_a_quote() {
        let blocks = parse("> one\n> two\n>\n> three\n");

        assert_eq!(
            blocks,
            vec![
                Block::quote(vec![Inline::text("one\ntwo")]),
                Block::quote(vec![Inline::text("three")]),
            ]
        );
    }

    #[rstest]
    #[case("```python\nprint(1)\n```\n", "python", "print(1)")]
    #[case("```brainfuck\n+++\n```\n", "javascript", "+++")]
    #[case("    indented\n", "javascript", "indented")]
    #[case("```SQL\nselect 1;\n```\n", "sql", "select 1;")]
    fn code_language_goes_through_the_policy(
        #[case] markdown: &str,
        #[case] language: &str,
        #[case] code: &str,
    ) {
        assert_eq!(parse(markdown), vec![Block::code(language, code)]);
    }

    #[test]
    fn media_lines_inside_fences_stay_code() {
        let markdown = "```html\n![a](http://x/i.png)\n<VideoPlayer src=\"v.mp4\" />\n```\n";
        assert_eq!(
            parse(markdown),
            vec![Block::code(
                "html",
                "![a](http://x/i.png)\n<VideoPlayer src=\"v.mp4\" />"
            )]
        );
    }

    #[test]
    fn video_line_between_paragraphs() {
        let blocks = parse("before\n\n<VideoPlayer src=\"https://cdn.x/v.mp4\" />\n\nafter\n");
        assert_eq!(
            blocks,
            vec![
                Block::paragraph(vec![Inline::text("before")]),
                Block::video("https://cdn.x/v.mp4"),
                Block::paragraph(vec![Inline::text("after")]),
            ]
        );
    }

    #[test]
    fn inline_image_splits_its_paragraph() {
        let blocks = parse("look ![cat](http://x/cat.png) here\n");
        assert_eq!(
            blocks,
            vec![
                Block::paragraph(vec![Inline::text("look ")]),
                Block::image("http://x/cat.png", "cat"),
                Block::paragraph(vec![Inline::text(" here")]),
            ]
        );
    }

    #[test]
    fn image_in_a_list_item_becomes_alt_text() {
        let blocks = parse("- see ![cat](http://x/cat.png)\n");
        assert_eq!(
            blocks,
            vec![Block::list(
                ListKind::Bullet,
                vec![ListItem::new(vec![Inline::text("see cat")])],
            )]
        );
    }

    #[test]
    fn links_and_code_carry_marks() {
        let blocks = parse("**[Rust](https://rust-lang.org)** and `x`\n");
        assert_eq!(
            blocks,
            vec![Block::paragraph(vec![
                Inline::link(
                    "https://rust-lang.org",
                    vec![TextRun::new("Rust", bold())]
                ),
                Inline::text(" and "),
                Inline::marked("x", MarkSet::new().with(Mark::Code)),
            ])]
        );
    }

    #[test]
    fn breaks_become_newlines_and_rules_become_text() {
        let blocks = parse("one\ntwo\n\n---\n\n<div>raw</div>\n");
        assert_eq!(
            blocks,
            vec![
                Block::paragraph(vec![Inline::text("one\ntwo")]),
                Block::paragraph(vec![Inline::text("---")]),
                Block::paragraph(vec![Inline::text("<div>raw</div>")]),
            ]
        );
    }

    #[test]
    fn deep_headings_are_demoted() {
        let blocks = parse("#### Deep\n\n### Kept\n");
        assert_eq!(
            blocks,
            vec![
                Block::heading(2, vec![Inline::text("Deep")]),
                Block::heading(3, vec![Inline::text("Kept")]),
            ]
        );
    }
}
