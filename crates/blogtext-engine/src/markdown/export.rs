//! Document → Markdown.
//!
//! Blocks are written one after another with a blank line between them.
//! Inline content goes through [`InlineWriter`], which turns the flat run
//! sequence back into properly nested `**`/`_` delimiter pairs.
//!
//! Characters the parser would drop or reinterpret, such as blanks at either
//! end of a line or a word character hugging a delimiter run, are written as
//! numeric character references.

use crate::markdown::transformers::{destination, image_to_markdown, video_to_markdown};
use crate::models::{Block, Inline, List, ListKind, Mark, MarkSet, TextRun};

/// Characters that would otherwise start Markdown syntax anywhere in a line.
const ESCAPED: [char; 11] = ['\\', '`', '*', '_', '[', ']', '<', '>', '&', '#', '~'];

pub fn write_markdown(blocks: &[Block]) -> String {
    let mut sections: Vec<String> = Vec::with_capacity(blocks.len());
    let mut previous_list: Option<(ListKind, bool)> = None;

    for block in blocks {
        let mut list_state = None;
        let section = match block {
            Block::Paragraph { content } => {
                let text = write_inlines(content);
                (!text.trim().is_empty()).then_some(text)
            }
            Block::Heading { level, content } => {
                let text = write_inlines(content).replace('\n', " ");
                let hashes = "#".repeat(usize::from(*level).clamp(1, 6));
                Some(if text.is_empty() {
                    hashes
                } else {
                    format!("{hashes} {text}")
                })
            }
            Block::Quote { content } => {
                let text = write_inlines(content);
                (!text.trim().is_empty()).then(|| quote_lines(&text))
            }
            Block::List(list) => {
                // Adjacent lists of one kind would merge on re-import unless
                // their markers differ.
                let alternate = match previous_list {
                    Some((kind, alternate)) if kind == list.kind => !alternate,
                    _ => false,
                };
                list_state = Some((list.kind, alternate));
                let mut lines = Vec::new();
                write_list(list, alternate, "", &mut lines);
                Some(lines.join("\n"))
            }
            Block::CodeBlock { language, code } => Some(code_fence(language, code)),
            Block::Image { src, alt } => Some(image_to_markdown(src, alt)),
            Block::Video { src } => Some(video_to_markdown(src)),
        };

        if let Some(section) = section {
            sections.push(section);
            previous_list = list_state;
        }
    }

    if sections.is_empty() {
        return String::new();
    }
    let mut out = sections.join("\n\n");
    out.push('\n');
    out
}

fn quote_lines(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                ">".to_string()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn write_list(list: &List, alternate: bool, indent: &str, lines: &mut Vec<String>) {
    for (i, item) in list.items.iter().enumerate() {
        let marker = match (list.kind, alternate) {
            (ListKind::Bullet, false) => "-".to_string(),
            (ListKind::Bullet, true) => "*".to_string(),
            (ListKind::Number, false) => format!("{}.", i + 1),
            (ListKind::Number, true) => format!("{})", i + 1),
        };
        let child_indent = format!("{indent}{}", " ".repeat(marker.len() + 1));

        let text = write_inlines(&item.content);
        if text.is_empty() {
            lines.push(format!("{indent}{marker}"));
        } else {
            let text = text.replace('\n', &format!("\n{child_indent}"));
            lines.push(format!("{indent}{marker} {text}"));
        }
        if let Some(nested) = &item.nested {
            write_list(nested, false, &child_indent, lines);
        }
    }
}

fn code_fence(language: &str, code: &str) -> String {
    let fence = "`".repeat(longest_backtick_run(code).max(2) + 1);
    if code.is_empty() {
        format!("{fence}{language}\n{fence}")
    } else {
        format!("{fence}{language}\n{code}\n{fence}")
    }
}

fn longest_backtick_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

fn code_span(text: &str) -> String {
    let text = text.replace('\n', " ");
    let fence = "`".repeat(longest_backtick_run(&text) + 1);
    let padded = text.starts_with('`')
        || text.ends_with('`')
        || (text.starts_with(' ') && text.ends_with(' ') && text.trim() != "");
    if padded {
        format!("{fence} {text} {fence}")
    } else {
        format!("{fence}{text}{fence}")
    }
}

/// Render inline content as a single Markdown string; embedded newlines are
/// kept so callers can indent or prefix continuation lines.
pub fn write_inlines(inlines: &[Inline]) -> String {
    let mut writer = InlineWriter::new();
    for inline in inlines {
        match inline {
            Inline::Text(run) => writer.run(run, 0),
            Inline::Link { url, children } => writer.link(url, children),
        }
    }
    writer.close_to(0);
    protect_line_ends(&writer.render())
}

#[derive(Debug)]
enum Token {
    Open(Mark),
    Close(Mark),
    Text(String),
}

/// Delimiter placement happens in two passes: runs become a token stream
/// with abstract open/close marks, then [`InlineWriter::render`] picks the
/// concrete delimiter for each pair once both neighbours are known.
struct InlineWriter {
    tokens: Vec<Token>,
    open: Vec<Mark>,
    line_start: bool,
}

impl InlineWriter {
    fn new() -> Self {
        Self {
            tokens: Vec::new(),
            open: Vec::new(),
            line_start: true,
        }
    }

    fn run(&mut self, run: &TextRun, floor: usize) {
        let wanted = emphasis(run);
        self.close_unwanted(wanted, floor);

        if run.marks.contains(Mark::Code) {
            self.open_wanted(wanted);
            self.raw(&code_span(&run.text));
            return;
        }

        let opening = wanted.iter().any(|mark| !self.open.contains(&mark));
        if opening {
            // Delimiters must touch non-whitespace to count as emphasis.
            let body = run.text.trim_start();
            self.text(&run.text[..run.text.len() - body.len()]);
            self.open_wanted(wanted);
            self.text(body);
        } else {
            self.text(&run.text);
        }
    }

    fn link(&mut self, url: &str, children: &[TextRun]) {
        let shared = children
            .iter()
            .map(emphasis)
            .reduce(|acc, marks| acc.iter().filter(|m| marks.contains(*m)).collect())
            .unwrap_or(MarkSet::EMPTY);
        self.close_unwanted(shared, 0);
        self.open_wanted(shared);

        // `![` would start an image.
        if let Some(Token::Text(last)) = self.tokens.last_mut()
            && last.ends_with('!')
        {
            last.pop();
            last.push_str("\\!");
        }
        self.raw("[");
        let floor = self.open.len();
        for child in children {
            self.run(child, floor);
        }
        self.close_to(floor);
        self.raw(&format!("]({})", destination(url)));
    }

    fn close_unwanted(&mut self, wanted: MarkSet, floor: usize) {
        let first_unwanted = self
            .open
            .iter()
            .skip(floor)
            .position(|mark| !wanted.contains(*mark));
        if let Some(position) = first_unwanted {
            self.close_to(floor + position);
        }
    }

    fn close_to(&mut self, depth: usize) {
        if self.open.len() <= depth {
            return;
        }
        let trailing = match self.tokens.last_mut() {
            Some(Token::Text(last)) => {
                let kept = last.trim_end().len();
                last.split_off(kept)
            }
            _ => String::new(),
        };
        while self.open.len() > depth {
            if let Some(mark) = self.open.pop() {
                self.tokens.push(Token::Close(mark));
            }
        }
        self.line_start = false;
        if !trailing.is_empty() {
            self.line_start = trailing.ends_with('\n');
            self.tokens.push(Token::Text(trailing));
        }
    }

    fn open_wanted(&mut self, wanted: MarkSet) {
        for mark in [Mark::Bold, Mark::Italic] {
            if wanted.contains(mark) && !self.open.contains(&mark) {
                self.tokens.push(Token::Open(mark));
                self.open.push(mark);
                self.line_start = false;
            }
        }
    }

    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let escaped = escape_text(text, &mut self.line_start);
        self.push_text(escaped);
    }

    fn raw(&mut self, text: &str) {
        self.push_text(text.to_string());
        self.line_start = false;
    }

    fn push_text(&mut self, text: String) {
        match self.tokens.last_mut() {
            Some(Token::Text(last)) => last.push_str(&text),
            _ => self.tokens.push(Token::Text(text)),
        }
    }

    fn render(self) -> String {
        let mut tokens = self.tokens;
        let mut delimiters: Vec<&str> = vec![""; tokens.len()];
        let mut stack: Vec<usize> = Vec::new();

        for (i, token) in tokens.iter().enumerate() {
            match token {
                Token::Open(_) => stack.push(i),
                Token::Close(mark) => {
                    if let Some(opened) = stack.pop() {
                        let delimiter = match mark {
                            Mark::Bold => "**",
                            // `_` cannot open or close inside a word.
                            _ if char_before(&tokens, opened).is_some_and(is_word_char)
                                || char_after(&tokens, i).is_some_and(is_word_char) =>
                            {
                                "*"
                            }
                            _ => "_",
                        };
                        delimiters[opened] = delimiter;
                        delimiters[i] = delimiter;
                    }
                }
                Token::Text(_) => {}
            }
        }
        protect_flanking(&mut tokens);

        let mut out = String::new();
        for (token, delimiter) in tokens.iter().zip(delimiters) {
            match token {
                Token::Text(text) => out.push_str(text),
                Token::Open(_) | Token::Close(_) => out.push_str(delimiter),
            }
        }
        out
    }
}

/// Character written just before token `index`. Delimiter tokens stand in as
/// `*`, since every delimiter is punctuation.
fn char_before(tokens: &[Token], index: usize) -> Option<char> {
    match tokens.get(index.checked_sub(1)?)? {
        Token::Text(text) => text.chars().next_back(),
        Token::Open(_) | Token::Close(_) => Some('*'),
    }
}

fn char_after(tokens: &[Token], index: usize) -> Option<char> {
    match tokens.get(index + 1)? {
        Token::Text(text) => text.chars().next(),
        Token::Open(_) | Token::Close(_) => Some('*'),
    }
}

/// Neither whitespace nor punctuation, so `_` cannot sit next to it.
fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !c.is_ascii_punctuation()
}

/// A delimiter run with punctuation on its inner side only opens or closes
/// when its outer side is whitespace or punctuation as well. A word character
/// on the outer side is replaced by its character reference, which starts
/// with `&` and ends with `;`.
fn protect_flanking(tokens: &mut [Token]) {
    let mut edges = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        let (inner, outer, edge) = match token {
            Token::Open(_) => (
                char_after(tokens, i),
                char_before(tokens, i),
                i.checked_sub(1).map(|before| (before, false)),
            ),
            Token::Close(_) => (
                char_before(tokens, i),
                char_after(tokens, i),
                Some((i + 1, true)),
            ),
            Token::Text(_) => continue,
        };
        let punctuated = inner.is_some_and(|c| !c.is_alphanumeric());
        if punctuated
            && outer.is_some_and(is_word_char)
            && let Some(edge) = edge
        {
            edges.push(edge);
        }
    }

    for (index, at_start) in edges {
        if let Some(Token::Text(text)) = tokens.get_mut(index) {
            encode_edge(text, at_start);
        }
    }
}

fn encode_edge(text: &mut String, at_start: bool) {
    let edge = if at_start {
        text.chars().next()
    } else {
        text.chars().next_back()
    };
    // Already encoded when both delimiters hug a one-character token.
    let Some(c) = edge.filter(|c| is_word_char(*c)) else {
        return;
    };
    let range = if at_start {
        0..c.len_utf8()
    } else {
        text.len() - c.len_utf8()..text.len()
    };
    text.replace_range(range, &char_reference(c));
}

fn char_reference(c: char) -> String {
    format!("&#{};", u32::from(c))
}

/// Blanks at the end of a line are stripped by the parser; the last one is
/// kept as a character reference so the rest survive with it.
fn protect_line_ends(text: &str) -> String {
    text.split('\n')
        .map(|line| match line.chars().next_back() {
            Some(c @ (' ' | '\t')) => {
                format!("{}{}", &line[..line.len() - 1], char_reference(c))
            }
            _ => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Bold and italic of a run. Whitespace-only text cannot carry emphasis
/// delimiters, so it is written plain.
fn emphasis(run: &TextRun) -> MarkSet {
    if !run.marks.contains(Mark::Code) && run.text.trim().is_empty() {
        return MarkSet::EMPTY;
    }
    run.marks.without(Mark::Code)
}

fn escape_text(text: &str, line_start: &mut bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
            *line_start = true;
        }
        let mut line = line;
        if *line_start {
            let body = line.trim_start_matches([' ', '\t']);
            let mut indent = line[..line.len() - body.len()].chars();
            if let Some(first) = indent.next() {
                // Leading blanks survive behind a character reference, which
                // also keeps the rest of the line from starting a block.
                out.push_str(&char_reference(first));
                out.push_str(indent.as_str());
                line = body;
            } else if body.is_empty() {
                continue;
            } else {
                line = escape_block_marker(body, &mut out);
            }
            *line_start = false;
        }
        for c in line.chars() {
            if ESCAPED.contains(&c) {
                out.push('\\');
            }
            out.push(c);
        }
    }
    out
}

/// Neutralize a line opening that would start a list item or a setext
/// underline. Returns the part of the line still to be written.
fn escape_block_marker<'a>(line: &'a str, out: &mut String) -> &'a str {
    if line.starts_with(['-', '+', '=']) {
        out.push('\\');
        return line;
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if (1..=9).contains(&digits) && line[digits..].starts_with(['.', ')']) {
        out.push_str(&line[..digits]);
        out.push('\\');
        return &line[digits..];
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListItem;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn marks(list: &[Mark]) -> MarkSet {
        list.iter().copied().collect()
    }

    #[test]
    fn blocks_are_separated_by_blank_lines() {
        let blocks = vec![
            Block::heading(2, vec![Inline::text("Title")]),
            Block::paragraph(vec![
                Inline::text("Some "),
                Inline::marked("bold", marks(&[Mark::Bold])),
                Inline::text(" text."),
            ]),
            Block::image("http://x/img.png", "alt text"),
            Block::video("https://cdn.x/v.mp4"),
        ];

        assert_eq!(
            write_markdown(&blocks),
            "## Title\n\nSome **bold** text.\n\n![alt text](http://x/img.png)\n\n<VideoPlayer src=\"https://cdn.x/v.mp4\" />\n"
        );
    }

    #[test]
    fn empty_document_is_empty_text() {
        assert_eq!(write_markdown(&[]), "");
        assert_eq!(write_markdown(&[Block::paragraph(vec![])]), "");
    }

    #[test]
    fn nested_lists_indent_by_marker_width() {
        let blocks = vec![Block::list(
            ListKind::Number,
            vec![
                ListItem::new(vec![Inline::text("one")]).with_nested(List::new(
                    ListKind::Bullet,
                    vec![ListItem::new(vec![Inline::text("sub\nmore")])],
                )),
                ListItem::new(vec![Inline::text("two")]),
            ],
        )];

        insta::assert_snapshot!(write_markdown(&blocks).trim_end(), @r"
        1. one
           - sub
             more
        2. two
        ");
    }

    #[test]
    fn adjacent_lists_alternate_markers() {
        let item = || vec![ListItem::new(vec![Inline::text("x")])];
        let blocks = vec![
            Block::list(ListKind::Bullet, item()),
            Block::list(ListKind::Bullet, item()),
            Block::list(ListKind::Bullet, item()),
            Block::list(ListKind::Number, item()),
            Block::list(ListKind::Number, item()),
        ];

        assert_eq!(
            write_markdown(&blocks),
            "- x\n\n* x\n\n- x\n\n1. x\n\n1) x\n"
        );
    }

    #[test]
    fn quotes_prefix_every_line() {
        let blocks = vec![Block::quote(vec![Inline::text("first\nsecond")])];
        assert_eq!(write_markdown(&blocks), "> first\n> second\n");
    }

    #[rstest]
    #[case("print(1)", "```python\nprint(1)\n```")]
    #[case("a ``` b", "````python\na ``` b\n````")]
    #[case("", "```python\n```")]
    fn code_fences_outgrow_backtick_runs(#[case] code: &str, #[case] expected: &str) {
        assert_eq!(code_fence("python", code), expected);
    }

    #[rstest]
    #[case("x<y", "`x<y`")]
    #[case("a`b", "``a`b``")]
    #[case("`tick", "`` `tick ``")]
    #[case(" both ", "`  both  `")]
    fn code_spans(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(code_span(text), expected);
    }

    #[rstest]
    #[case("# not a heading", r"\# not a heading")]
    #[case("- not a list", r"\- not a list")]
    #[case("1. not a list", r"1\. not a list")]
    #[case("*stars* and _under_", r"\*stars\* and \_under\_")]
    #[case("a [b] <c> & d\\e", r"a \[b\] \<c\> \& d\\e")]
    #[case("line\n+ plus", "line\n\\+ plus")]
    fn text_is_escaped(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(write_inlines(&[Inline::text(text)]), expected);
    }

    #[rstest]
    #[case("  indented", "&#32; indented")]
    #[case("\tx", "&#9;x")]
    #[case("  - still text", "&#32; - still text")]
    #[case("trailing  ", "trailing &#32;")]
    #[case("a \n  b", "a&#32;\n&#32; b")]
    fn blanks_at_line_edges_become_references(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(write_inlines(&[Inline::text(text)]), expected);
    }

    #[test]
    fn bang_before_a_link_is_escaped() {
        let inlines = vec![
            Inline::text("Wow!"),
            Inline::link("https://x.com", vec![TextRun::plain("docs")]),
        ];
        assert_eq!(write_inlines(&inlines), r"Wow\![docs](https://x.com)");
    }

    #[rstest]
    #[case::closing(
        vec![Inline::marked("a.", marks(&[Mark::Bold])), Inline::text("b")],
        "**a.**&#98;"
    )]
    #[case::opening(
        vec![Inline::text("a"), Inline::marked(".b", marks(&[Mark::Bold]))],
        "&#97;**.b**"
    )]
    #[case::italic_both_sides(
        vec![
            Inline::text("a"),
            Inline::marked("(b)", marks(&[Mark::Italic])),
            Inline::text("c"),
        ],
        "&#97;*(b)*&#99;"
    )]
    #[case::nested_close(
        vec![
            Inline::marked("x", marks(&[Mark::Bold, Mark::Italic])),
            Inline::text("y"),
        ],
        "**_x_**&#121;"
    )]
    #[case::spaced_punctuation_untouched(
        vec![Inline::text("say "), Inline::marked("\"hi\"", marks(&[Mark::Bold])), Inline::text(" now")],
        "say **\"hi\"** now"
    )]
    fn word_characters_next_to_punctuated_delimiters(
        #[case] inlines: Vec<Inline>,
        #[case] expected: &str,
    ) {
        assert_eq!(write_inlines(&inlines), expected);
    }

    #[test]
    fn whitespace_moves_outside_delimiters() {
        let inlines = vec![
            Inline::text("a"),
            Inline::marked(" bold ", marks(&[Mark::Bold])),
            Inline::text("b"),
        ];
        assert_eq!(write_inlines(&inlines), "a **bold** b");
    }

    #[test]
    fn overlapping_marks_nest() {
        let inlines = vec![
            Inline::marked("bold ", marks(&[Mark::Bold])),
            Inline::marked("both", marks(&[Mark::Bold, Mark::Italic])),
            Inline::marked(" italic", marks(&[Mark::Italic])),
        ];
        assert_eq!(write_inlines(&inlines), "**bold _both_** _italic_");
    }

    #[test]
    fn intraword_italic_uses_asterisks() {
        let inlines = vec![
            Inline::text("un"),
            Inline::marked("believ", marks(&[Mark::Italic])),
            Inline::text("able"),
        ];
        assert_eq!(write_inlines(&inlines), "un*believ*able");
    }

    #[test]
    fn links_keep_marks_inside_brackets() {
        let inlines = vec![
            Inline::text("See "),
            Inline::link(
                "https://doc.rust-lang.org/book (2nd)",
                vec![
                    TextRun::plain("the "),
                    TextRun::new("book", marks(&[Mark::Bold])),
                ],
            ),
        ];
        assert_eq!(
            write_inlines(&inlines),
            "See [the **book**](<https://doc.rust-lang.org/book (2nd)>)"
        );
    }

    #[test]
    fn bold_code_is_wrapped_around_the_span() {
        let inlines = vec![
            Inline::text("call "),
            Inline::marked("run()", marks(&[Mark::Bold, Mark::Code])),
        ];
        assert_eq!(write_inlines(&inlines), "call **`run()`**");
    }
}
