//! Minimal, forgiving DOM for imported HTML.
//!
//! Only what the importer needs: elements with lower-cased names and decoded
//! attributes, and text with entities decoded. Void elements never take
//! children, unmatched close tags are ignored, unclosed elements are closed
//! at the end of input, and `script`/`style` are dropped with their content.

use std::sync::OnceLock;

use regex::Regex;

use crate::html::lexer::{TokenKind, lex};

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose content is not markup and is discarded whole.
const RAW_TEXT_ELEMENTS: [&str; 4] = ["script", "style", "template", "noscript"];

/// Elements that implicitly close an open `<p>`.
pub const BLOCK_ELEMENTS: [&str; 24] = [
    "address", "article", "aside", "blockquote", "details", "div", "dl", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "ol", "p", "pre", "ul",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomNode {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<DomNode>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            DomNode::Element(element) => Some(element),
            DomNode::Text(_) => None,
        })
    }
}

static TAG_NAME: OnceLock<Regex> = OnceLock::new();
static ATTRIBUTE: OnceLock<Regex> = OnceLock::new();

fn tag_name() -> &'static Regex {
    TAG_NAME.get_or_init(|| Regex::new(r"^</?([A-Za-z][A-Za-z0-9-]*)").expect("Invalid tag name regex"))
}

pub(crate) fn attribute() -> &'static Regex {
    ATTRIBUTE.get_or_init(|| {
        Regex::new(r#"([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
            .expect("Invalid attribute regex")
    })
}

/// Byte length of the `<name` (or `</name`) prefix of a tag token.
pub(crate) fn tag_prefix_len(tag: &str) -> usize {
    tag_name().find(tag).map_or(0, |m| m.end())
}

/// Parse the text of an opening tag. Returns the element and whether it was
/// written self-closing.
pub fn parse_start_tag(tag: &str) -> Option<(Element, bool)> {
    let name = tag_name().captures(tag)?.get(1)?.as_str().to_ascii_lowercase();
    let body = tag[tag_prefix_len(tag)..].trim_end_matches('>').trim_end();
    let self_closing = body.ends_with('/');

    let mut element = Element::new(name);
    for caps in attribute().captures_iter(body) {
        let key = caps[1].to_ascii_lowercase();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map_or("", |m| m.as_str());
        if element.attr(&key).is_none() {
            element
                .attrs
                .push((key, html_escape::decode_html_entities(value).into_owned()));
        }
    }
    Some((element, self_closing))
}

fn close_tag_name(tag: &str) -> Option<String> {
    Some(tag_name().captures(tag)?.get(1)?.as_str().to_ascii_lowercase())
}

/// Parse an HTML fragment into a forest of nodes.
pub fn parse_fragment(html: &str) -> Vec<DomNode> {
    let mut builder = TreeBuilder::default();
    let mut skipping: Option<String> = None;

    for token in lex(html) {
        if let Some(raw) = &skipping {
            let closes = match token.kind {
                TokenKind::CloseTag => close_tag_name(token.text).as_ref() == Some(raw),
                // `a<b` inside a script lexes as a tag that can swallow the close tag
                _ => token
                    .text
                    .to_ascii_lowercase()
                    .contains(&format!("</{raw}")),
            };
            if closes {
                skipping = None;
            }
            continue;
        }

        match token.kind {
            TokenKind::Text => builder.text(&html_escape::decode_html_entities(token.text)),
            TokenKind::Lt => builder.text(token.text),
            TokenKind::Declaration => {}
            TokenKind::OpenTag => {
                let Some((element, self_closing)) = parse_start_tag(token.text) else {
                    builder.text(token.text);
                    continue;
                };
                if RAW_TEXT_ELEMENTS.contains(&element.name.as_str()) {
                    if !self_closing {
                        log::trace!("skipping <{}> content", element.name);
                        skipping = Some(element.name);
                    }
                    continue;
                }
                builder.open(element, self_closing);
            }
            TokenKind::CloseTag => {
                if let Some(name) = close_tag_name(token.text) {
                    builder.close(&name);
                }
            }
        }
    }

    builder.finish()
}

#[derive(Default)]
struct TreeBuilder {
    root: Vec<DomNode>,
    stack: Vec<Element>,
}

impl TreeBuilder {
    fn children_mut(&mut self) -> &mut Vec<DomNode> {
        match self.stack.last_mut() {
            Some(element) => &mut element.children,
            None => &mut self.root,
        }
    }

    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let children = self.children_mut();
        match children.last_mut() {
            Some(DomNode::Text(previous)) => previous.push_str(text),
            _ => children.push(DomNode::Text(text.to_string())),
        }
    }

    fn open(&mut self, element: Element, self_closing: bool) {
        self.close_implied(&element.name);
        if self_closing || VOID_ELEMENTS.contains(&element.name.as_str()) {
            self.children_mut().push(DomNode::Element(element));
        } else {
            self.stack.push(element);
        }
    }

    /// `<li>` ends the previous item of the same list, and a block element
    /// ends an open paragraph.
    fn close_implied(&mut self, name: &str) {
        if name == "li" {
            let item = self.stack.iter().rposition(|e| e.name == "li");
            let list = self
                .stack
                .iter()
                .rposition(|e| e.name == "ul" || e.name == "ol");
            if let Some(item) = item
                && list.is_none_or(|list| item > list)
            {
                self.pop_to(item);
            }
        }
        if BLOCK_ELEMENTS.contains(&name)
            && let Some(paragraph) = self.stack.iter().rposition(|e| e.name == "p")
        {
            let only_inline_above = self.stack[paragraph + 1..]
                .iter()
                .all(|e| !BLOCK_ELEMENTS.contains(&e.name.as_str()));
            if only_inline_above {
                self.pop_to(paragraph);
            }
        }
    }

    fn close(&mut self, name: &str) {
        match self.stack.iter().rposition(|e| e.name == name) {
            Some(index) => self.pop_to(index),
            None => log::debug!("ignoring unmatched </{name}>"),
        }
    }

    /// Close the element at `index` and everything opened inside it.
    fn pop_to(&mut self, index: usize) {
        while self.stack.len() > index {
            if let Some(element) = self.stack.pop() {
                self.children_mut().push(DomNode::Element(element));
            }
        }
    }

    fn finish(mut self) -> Vec<DomNode> {
        self.pop_to(0);
        self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn element(name: &str, children: Vec<DomNode>) -> DomNode {
        DomNode::Element(Element {
            name: name.to_string(),
            attrs: Vec::new(),
            children,
        })
    }

    fn text(text: &str) -> DomNode {
        DomNode::Text(text.to_string())
    }

    #[test]
    fn attributes_are_lowercased_and_decoded() {
        let (element, self_closing) =
            parse_start_tag(r#"<IMG SRC="/a.png?x=1&amp;y=2" alt='a "cat"' hidden />"#)
                .expect("tag parses");
        assert_eq!(element.name, "img");
        assert_eq!(element.attr("src"), Some("/a.png?x=1&y=2"));
        assert_eq!(element.attr("alt"), Some("a \"cat\""));
        assert_eq!(element.attr("hidden"), Some(""));
        assert!(self_closing);
    }

    #[test]
    fn unclosed_and_mismatched_tags_recover() {
        let nodes = parse_fragment("<p>one <b>two</i></p><p>three");
        assert_eq!(
            nodes,
            vec![
                element("p", vec![text("one "), element("b", vec![text("two")])]),
                element("p", vec![text("three")]),
            ]
        );
    }

    #[test]
    fn list_items_and_paragraphs_close_implicitly() {
        let nodes = parse_fragment("<ul><li>a<li>b</ul><p>x<div>y</div>");
        assert_eq!(
            nodes,
            vec![
                element(
                    "ul",
                    vec![element("li", vec![text("a")]), element("li", vec![text("b")])]
                ),
                element("p", vec![text("x")]),
                element("div", vec![text("y")]),
            ]
        );
    }

    #[test]
    fn scripts_are_dropped_and_entities_decoded() {
        let nodes = parse_fragment("<script>if (a < b) {}</script>Tom &amp; Jerry<br>");
        assert_eq!(nodes, vec![text("Tom & Jerry"), element("br", vec![])]);
    }
}
