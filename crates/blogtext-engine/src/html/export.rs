//! Document → HTML.
//!
//! Markup is first built with the theme's class names (what the editor shows
//! while authoring). Persisted HTML goes through [`strip_classes`] so stored
//! content carries no presentation; themes are applied at render time.

use serde::{Deserialize, Serialize};

use crate::html::dom::{attribute, tag_prefix_len};
use crate::html::lexer::{TokenKind, lex};
use crate::models::{Block, Document, Inline, List, ListKind, Mark, TextRun};

pub(crate) const NBSP: char = '\u{a0}';

/// Class names put on exported elements. Empty strings emit no attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportTheme {
    pub paragraph: String,
    pub heading_h2: String,
    pub heading_h3: String,
    pub bold: String,
    pub italic: String,
    pub code: String,
    pub link: String,
    pub list_bullet: String,
    pub list_number: String,
    pub list_item: String,
    pub code_block: String,
    pub quote: String,
}

impl Default for ExportTheme {
    /// The blog editor's authoring theme.
    fn default() -> Self {
        Self {
            paragraph: "text-foreground-70 mb-5".to_string(),
            heading_h2: "text-3xl font-medium mt-10 mb-4".to_string(),
            heading_h3: "text-xl font-medium text-foreground mt-8 mb-3".to_string(),
            bold: "font-bold".to_string(),
            italic: "italic".to_string(),
            code: "font-mono text-sm text-accent bg-foreground-10 px-1.5 py-0.5 rounded"
                .to_string(),
            link: "text-accent underline underline-offset-4".to_string(),
            list_bullet: "list-disc list-inside mb-5 pl-4 space-y-1".to_string(),
            list_number: "list-decimal list-inside mb-5 pl-4 space-y-1".to_string(),
            list_item: "text-foreground-70".to_string(),
            code_block: "relative p-4 rounded-lg overflow-x-auto mb-6 font-mono text-sm block"
                .to_string(),
            quote: "border-l-4 border-foreground-20 pl-4 italic text-foreground-60 mb-5"
                .to_string(),
        }
    }
}

impl ExportTheme {
    /// A theme with no classes at all.
    pub fn plain() -> Self {
        Self {
            paragraph: String::new(),
            heading_h2: String::new(),
            heading_h3: String::new(),
            bold: String::new(),
            italic: String::new(),
            code: String::new(),
            link: String::new(),
            list_bullet: String::new(),
            list_number: String::new(),
            list_item: String::new(),
            code_block: String::new(),
            quote: String::new(),
        }
    }

    fn heading(&self, level: u8) -> &str {
        match level {
            2 => &self.heading_h2,
            3 => &self.heading_h3,
            _ => "",
        }
    }
}

/// Persisted HTML: themed markup with every `class` attribute removed.
pub fn to_html(doc: &Document) -> String {
    strip_classes(&to_themed_html(doc, &ExportTheme::default()))
}

/// Markup with theme classes, for previews.
pub fn to_themed_html(doc: &Document, theme: &ExportTheme) -> String {
    write_html(&doc.to_blocks(), theme)
}

pub fn write_html(blocks: &[Block], theme: &ExportTheme) -> String {
    let mut out = String::new();
    for block in blocks {
        write_block(&mut out, block, theme);
    }
    out
}

fn write_block(out: &mut String, block: &Block, theme: &ExportTheme) {
    match block {
        Block::Paragraph { content } => {
            open_tag(out, "p", &theme.paragraph, &[]);
            if content.is_empty() {
                out.push_str("<br>");
            } else {
                write_inlines(out, content, theme);
            }
            out.push_str("</p>");
        }
        Block::Heading { level, content } => {
            let name = format!("h{}", (*level).clamp(1, 6));
            open_tag(out, &name, theme.heading(*level), &[]);
            write_inlines(out, content, theme);
            out.push_str(&format!("</{name}>"));
        }
        Block::Quote { content } => {
            open_tag(out, "blockquote", &theme.quote, &[]);
            write_inlines(out, content, theme);
            out.push_str("</blockquote>");
        }
        Block::List(list) => write_list(out, list, theme),
        Block::CodeBlock { language, code } => {
            open_tag(out, "pre", &theme.code_block, &[("data-language", language.as_str())]);
            // A newline right after <pre> is swallowed by parsers.
            if code.starts_with('\n') {
                out.push('\n');
            }
            out.push_str(&html_escape::encode_text(code));
            out.push_str("</pre>");
        }
        Block::Image { src, alt } => open_tag(out, "img", "", &[("src", src.as_str()), ("alt", alt.as_str())]),
        Block::Video { src } => {
            open_tag(out, "video", "", &[("src", src.as_str()), ("controls", "")]);
            out.push_str("</video>");
        }
    }
}

fn write_list(out: &mut String, list: &List, theme: &ExportTheme) {
    let (name, class) = match list.kind {
        ListKind::Bullet => ("ul", &theme.list_bullet),
        ListKind::Number => ("ol", &theme.list_number),
    };
    open_tag(out, name, class, &[]);
    for item in &list.items {
        open_tag(out, "li", &theme.list_item, &[]);
        write_inlines(out, &item.content, theme);
        if let Some(nested) = &item.nested {
            write_list(out, nested, theme);
        }
        out.push_str("</li>");
    }
    out.push_str(&format!("</{name}>"));
}

fn write_inlines(out: &mut String, inlines: &[Inline], theme: &ExportTheme) {
    let texts: Vec<&str> = inlines
        .iter()
        .flat_map(|inline| match inline {
            Inline::Text(run) => std::slice::from_ref(run),
            Inline::Link { children, .. } => children.as_slice(),
        })
        .map(|run| run.text.as_str())
        .collect();
    let mut index = 0;
    let mut next_run = |out: &mut String, run: &TextRun| {
        let before = texts[..index].iter().rev().find_map(|t| t.chars().next_back());
        let after = texts[index + 1..].iter().find_map(|t| t.chars().next());
        write_run(out, run, theme, before, after);
        index += 1;
    };

    for inline in inlines {
        match inline {
            Inline::Text(run) => next_run(out, run),
            Inline::Link { url, children } => {
                open_tag(out, "a", &theme.link, &[("href", url.as_str())]);
                for run in children {
                    next_run(out, run);
                }
                out.push_str("</a>");
            }
        }
    }
}

/// `before` and `after` are the neighbouring characters within the block,
/// across run and link boundaries.
fn write_run(
    out: &mut String,
    run: &TextRun,
    theme: &ExportTheme,
    before: Option<char>,
    after: Option<char>,
) {
    let wrappers = [
        (Mark::Bold, "strong", &theme.bold),
        (Mark::Italic, "em", &theme.italic),
        (Mark::Code, "code", &theme.code),
    ];
    let active: Vec<_> = wrappers
        .iter()
        .filter(|(mark, _, _)| run.marks.contains(*mark))
        .collect();

    for (_, name, class) in &active {
        open_tag(out, name, class, &[]);
    }
    let text = keep_spaces(&run.text, before, after);
    let text = html_escape::encode_text(&text);
    out.push_str(&text.replace('\n', "<br>").replace(NBSP, "&nbsp;"));
    for (_, name, _) in active.iter().rev() {
        out.push_str(&format!("</{name}>"));
    }
}

/// Turn every space a reader would collapse into a non-breaking one: spaces
/// at either end of a line and spaces following another space.
fn keep_spaces(text: &str, before: Option<char>, after: Option<char>) -> String {
    let chars: Vec<char> = text.chars().collect();
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let prev = i.checked_sub(1).map_or(before, |p| Some(chars[p]));
            let next = chars.get(i + 1).copied().or(after);
            let collapsible = c == ' '
                && (matches!(prev, None | Some(' ' | '\n')) || matches!(next, None | Some('\n')));
            if collapsible { NBSP } else { c }
        })
        .collect()
}

/// Write `<name class="…" attr="…">`. The class always comes first.
fn open_tag(out: &mut String, name: &str, class: &str, attrs: &[(&str, &str)]) {
    out.push('<');
    out.push_str(name);
    if !class.is_empty() {
        out.push_str(&format!(
            " class=\"{}\"",
            html_escape::encode_double_quoted_attribute(class)
        ));
    }
    for (key, value) in attrs {
        if value.is_empty() {
            out.push_str(&format!(" {key}"));
        } else {
            out.push_str(&format!(
                " {key}=\"{}\"",
                html_escape::encode_double_quoted_attribute(value)
            ));
        }
    }
    out.push('>');
}

/// Remove every `class` attribute from the opening tags of `html`; text and
/// all other attributes pass through byte for byte.
pub fn strip_classes(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    for token in lex(html) {
        match token.kind {
            TokenKind::OpenTag => out.push_str(&strip_class_attribute(token.text)),
            _ => out.push_str(token.text),
        }
    }
    out
}

fn strip_class_attribute(tag: &str) -> String {
    let start = tag_prefix_len(tag);
    let mut out = String::from(&tag[..start]);
    let mut copied = start;
    for caps in attribute().captures_iter(&tag[start..]) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if caps[1].eq_ignore_ascii_case("class") {
            out.push_str(tag[copied..start + whole.start()].trim_end());
            copied = start + whole.end();
        }
    }
    out.push_str(&tag[copied..]);
    out
}
