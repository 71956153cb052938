//! HTML → blocks.
//!
//! Recognized tags map onto the model; anything else is transparent, so its
//! text ends up in the nearest paragraph. Whitespace is collapsed the way a
//! browser renders it, except inside `<pre>`. Non-breaking spaces survive the
//! collapsing and are read back as plain spaces.

use crate::editing::heading_rule;
use crate::html::dom::{BLOCK_ELEMENTS, DomNode, Element, parse_fragment};
use crate::html::export::NBSP;
use crate::models::blocks::{normalize_inlines, normalize_runs};
use crate::models::{Block, Inline, LanguagePolicy, List, ListItem, ListKind, Mark, MarkSet, TextRun};

/// Parse HTML (persisted or pasted) into blocks, demoting out-of-range headings.
pub fn parse_html(html: &str, policy: &LanguagePolicy) -> Vec<Block> {
    let nodes = parse_fragment(html);
    let mut importer = HtmlImporter::new(policy, false);
    importer.nodes(&nodes, MarkSet::EMPTY);
    let mut blocks = importer.finish();

    let demoted = heading_rule::enforce_blocks(&mut blocks);
    if demoted > 0 {
        log::debug!("Demoted {demoted} out-of-range headings during HTML import");
    }
    blocks
}

struct HtmlImporter<'p> {
    policy: &'p LanguagePolicy,
    blocks: Vec<Block>,
    /// Inline content waiting for its paragraph (explicit or implied)
    pending: InlineCollector,
    /// Level of the heading whose children are being walked
    heading_level: Option<u8>,
    /// List items hold no media; images there fall back to alt text
    in_list_item: bool,
}

impl<'p> HtmlImporter<'p> {
    fn new(policy: &'p LanguagePolicy, in_list_item: bool) -> Self {
        Self {
            policy,
            blocks: Vec::new(),
            pending: InlineCollector::default(),
            heading_level: None,
            in_list_item,
        }
    }

    /// Whether block elements start new blocks here, rather than being
    /// flattened into the current inline content.
    fn block_context(&self) -> bool {
        self.heading_level.is_none() && !self.pending.in_link()
    }

    fn nodes(&mut self, nodes: &[DomNode], marks: MarkSet) {
        for node in nodes {
            match node {
                DomNode::Text(text) => self.pending.push(&collapse_whitespace(text), marks),
                DomNode::Element(element) => self.element(element, marks),
            }
        }
    }

    fn element(&mut self, element: &Element, marks: MarkSet) {
        let name = element.name.as_str();
        if !self.block_context() && is_block_element(name) {
            self.nodes(&element.children, marks);
            return;
        }

        match name {
            "br" => self.pending.push_break(),
            "strong" | "b" => self.nodes(&element.children, marks.with(Mark::Bold)),
            "em" | "i" => self.nodes(&element.children, marks.with(Mark::Italic)),
            "code" | "kbd" | "samp" | "tt" => {
                if self.block_context() && self.pending.is_empty() && has_literal_newline(element) {
                    self.code_block(element, None);
                } else {
                    self.nodes(&element.children, marks.with(Mark::Code));
                }
            }
            "a" => match element.attr("href") {
                Some(href) if !self.pending.in_link() => {
                    self.pending.start_link(href.trim());
                    self.nodes(&element.children, marks);
                    self.pending.end_link();
                }
                _ => self.nodes(&element.children, marks),
            },
            "img" => self.image(element, marks),
            "video" => self.video(element),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse().unwrap_or(2);
                self.heading(level, element);
            }
            "p" => self.paragraph(element),
            "blockquote" => self.quote(element),
            "ul" | "ol" => {
                self.flush();
                let list = self.list(element);
                if !list.items.is_empty() {
                    self.blocks.push(Block::List(list));
                }
            }
            "pre" => self.code_block(element, Some(element)),
            "hr" => self.flush(),
            "li" => {
                // An item outside any list reads as a paragraph.
                self.flush();
                self.nodes(&element.children, MarkSet::EMPTY);
                self.flush();
            }
            "head" | "title" | "iframe" | "object" | "svg" | "canvas" | "select" | "button" => {
                log::trace!("dropping <{name}>");
            }
            _ if is_block_element(name) => {
                self.flush();
                self.nodes(&element.children, marks);
                self.flush();
            }
            _ => self.nodes(&element.children, marks),
        }
    }

    /// Turn pending inline content into an implied paragraph.
    fn flush(&mut self) {
        let content = self.pending.take();
        if !content.is_empty() {
            self.blocks.push(Block::paragraph(content));
        }
    }

    fn paragraph(&mut self, element: &Element) {
        self.flush();
        let before = self.blocks.len();
        self.nodes(&element.children, MarkSet::EMPTY);
        let mut content = self.pending.take();
        // `<p><br></p>` is how an empty paragraph is written.
        if content == [Inline::text("\n")] {
            content.clear();
        }
        // An explicit empty <p> is kept; one that only held media is not.
        if !content.is_empty() || self.blocks.len() == before {
            self.blocks.push(Block::paragraph(content));
        }
    }

    fn heading(&mut self, level: u8, element: &Element) {
        self.flush();
        self.heading_level = Some(level);
        self.nodes(&element.children, MarkSet::EMPTY);
        self.heading_level = None;
        let content = self.pending.take();
        self.blocks.push(Block::heading(level, content));
    }

    fn quote(&mut self, element: &Element) {
        self.flush();
        let mut inner = HtmlImporter::new(self.policy, self.in_list_item);
        inner.nodes(&element.children, MarkSet::EMPTY);
        for block in inner.finish() {
            match block {
                Block::Paragraph { content } | Block::Heading { content, .. } => {
                    if !content.is_empty() {
                        self.blocks.push(Block::quote(content));
                    }
                }
                other => self.blocks.push(other),
            }
        }
    }

    fn list(&self, element: &Element) -> List {
        let kind = if element.name == "ol" {
            ListKind::Number
        } else {
            ListKind::Bullet
        };
        let mut list = List::new(kind, Vec::new());
        for child in element.child_elements() {
            match child.name.as_str() {
                "li" => list.items.push(self.list_item(child)),
                // A list directly inside a list belongs to the previous item.
                "ul" | "ol" => {
                    let nested = self.list(child);
                    match list.items.last_mut() {
                        Some(item) => attach_nested(item, nested),
                        None => list.items.extend(nested.items),
                    }
                }
                _ => {}
            }
        }
        list
    }

    fn list_item(&self, element: &Element) -> ListItem {
        let mut inner = HtmlImporter::new(self.policy, true);
        inner.nodes(&element.children, MarkSet::EMPTY);

        let mut item = ListItem::new(Vec::new());
        for block in inner.finish() {
            let content = match block {
                Block::Paragraph { content }
                | Block::Heading { content, .. }
                | Block::Quote { content } => content,
                Block::CodeBlock { code, .. } => vec![Inline::text(code)],
                Block::List(nested) => {
                    attach_nested(&mut item, nested);
                    continue;
                }
                Block::Image { .. } | Block::Video { .. } => continue,
            };
            if content.is_empty() {
                continue;
            }
            if !item.content.is_empty() {
                item.content.push(Inline::text("\n"));
            }
            item.content.extend(content);
        }
        item.content = normalize_inlines(std::mem::take(&mut item.content));
        item
    }

    fn code_block(&mut self, element: &Element, pre: Option<&Element>) {
        self.flush();
        let language = code_language(element)
            .or_else(|| pre.and_then(|pre| pre.child_elements().find_map(code_language)));
        let text = raw_text(element);
        let code = text.strip_prefix('\n').unwrap_or(&text);
        self.blocks
            .push(Block::code(self.policy.resolve(language.as_deref()), code));
    }

    fn splits_media(&self) -> bool {
        self.block_context() && !self.in_list_item
    }

    fn image(&mut self, element: &Element, marks: MarkSet) {
        let src = element.attr("src").unwrap_or_default().trim();
        if src.is_empty() {
            log::debug!("dropping <img> without src");
            return;
        }
        let alt = element.attr("alt").unwrap_or_default();
        if self.splits_media() {
            self.flush();
            self.blocks.push(Block::image(src, alt));
        } else {
            self.pending.push(&collapse_whitespace(alt), marks);
        }
    }

    fn video(&mut self, element: &Element) {
        let src = element
            .attr("src")
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .or_else(|| {
                element
                    .child_elements()
                    .filter(|child| child.name == "source")
                    .find_map(|source| source.attr("src").map(str::trim).filter(|s| !s.is_empty()))
            });
        let Some(src) = src else {
            log::debug!("dropping <video> without src");
            return;
        };
        if self.splits_media() {
            self.flush();
            self.blocks.push(Block::video(src));
        } else {
            log::debug!("dropping <video> inside inline-only content");
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        self.blocks
    }
}

fn is_block_element(name: &str) -> bool {
    BLOCK_ELEMENTS.contains(&name) || matches!(name, "li" | "section" | "main" | "nav" | "table" | "tr")
}

fn attach_nested(item: &mut ListItem, list: List) {
    match &mut item.nested {
        Some(existing) => existing.items.extend(list.items),
        None => item.nested = Some(list),
    }
}

/// `data-language`, `data-highlight-language`, or a `language-*`/`lang-*` class.
fn code_language(element: &Element) -> Option<String> {
    element
        .attr("data-language")
        .or_else(|| element.attr("data-highlight-language"))
        .filter(|lang| !lang.trim().is_empty())
        .map(str::to_string)
        .or_else(|| {
            element.classes().find_map(|class| {
                class
                    .strip_prefix("language-")
                    .or_else(|| class.strip_prefix("lang-"))
                    .map(str::to_string)
            })
        })
}

/// Text content with `<br>` as a newline and whitespace untouched.
fn raw_text(element: &Element) -> String {
    let mut out = String::new();
    for child in &element.children {
        match child {
            DomNode::Text(text) => out.push_str(text),
            DomNode::Element(inner) if inner.name == "br" => out.push('\n'),
            DomNode::Element(inner) => out.push_str(&raw_text(inner)),
        }
    }
    out
}

/// Source newlines only; `<br>` inside inline code is a soft line break.
fn has_literal_newline(element: &Element) -> bool {
    element.children.iter().any(|child| match child {
        DomNode::Text(text) => text.contains('\n'),
        DomNode::Element(inner) => has_literal_newline(inner),
    })
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn unprotect_spaces(run: &mut TextRun) {
    if run.text.contains(NBSP) {
        run.text = run.text.replace(NBSP, " ");
    }
}

/// Inline content under construction, with browser-like space handling:
/// no space at the start of a block, after a line break, or doubled across
/// element boundaries, and none at the end.
#[derive(Default)]
struct InlineCollector {
    inlines: Vec<Inline>,
    link: Option<(String, Vec<TextRun>)>,
}

impl InlineCollector {
    fn in_link(&self) -> bool {
        self.link.is_some()
    }

    fn is_empty(&self) -> bool {
        self.inlines.is_empty() && self.link.as_ref().is_none_or(|(_, runs)| runs.is_empty())
    }

    fn last_run_mut(&mut self) -> Option<&mut TextRun> {
        if let Some((_, runs)) = &mut self.link
            && !runs.is_empty()
        {
            return runs.last_mut();
        }
        match self.inlines.last_mut() {
            Some(Inline::Text(run)) => Some(run),
            Some(Inline::Link { children, .. }) => children.last_mut(),
            None => None,
        }
    }

    fn ends_with_space(&mut self) -> bool {
        self.last_run_mut()
            .is_none_or(|run| run.text.ends_with(' ') || run.text.ends_with('\n'))
    }

    fn push(&mut self, text: &str, marks: MarkSet) {
        let text = match text.strip_prefix(' ') {
            Some(rest) if self.ends_with_space() => rest,
            _ => text,
        };
        if text.is_empty() {
            return;
        }
        match &mut self.link {
            Some((_, runs)) => runs.push(TextRun::new(text, marks)),
            None => self.inlines.push(Inline::marked(text, marks)),
        }
    }

    fn push_break(&mut self) {
        self.trim_trailing_space();
        match &mut self.link {
            Some((_, runs)) => runs.push(TextRun::plain("\n")),
            None => self.inlines.push(Inline::text("\n")),
        }
    }

    fn trim_trailing_space(&mut self) {
        if let Some(run) = self.last_run_mut() {
            let kept = run.text.trim_end_matches(' ').len();
            run.text.truncate(kept);
        }
    }

    fn start_link(&mut self, url: &str) {
        self.end_link();
        self.link = Some((url.to_string(), Vec::new()));
    }

    fn end_link(&mut self) {
        if let Some((url, runs)) = self.link.take() {
            let children = normalize_runs(runs);
            if !children.is_empty() {
                self.inlines.push(Inline::Link { url, children });
            }
        }
    }

    /// Non-breaking spaces only protect spaces from collapsing; they come
    /// out as plain spaces.
    fn take(&mut self) -> Vec<Inline> {
        self.end_link();
        self.trim_trailing_space();
        let mut inlines = std::mem::take(&mut self.inlines);
        for inline in &mut inlines {
            match inline {
                Inline::Text(run) => unprotect_spaces(run),
                Inline::Link { children, .. } => children.iter_mut().for_each(unprotect_spaces),
            }
        }
        normalize_inlines(inlines)
    }
}
