//! Owned, key-free document trees.
//!
//! These are the values both deserializers produce and the shape
//! [`Document::to_blocks`](crate::Document::to_blocks) reports. Two documents are
//! structurally equal when their block trees are equal.

use serde::{Deserialize, Serialize};

use super::node::{ListKind, MarkSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph { content: Vec<Inline> },
    Heading { level: u8, content: Vec<Inline> },
    Quote { content: Vec<Inline> },
    List(List),
    CodeBlock { language: String, code: String },
    Image { src: String, alt: String },
    Video { src: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct List {
    pub kind: ListKind,
    pub items: Vec<ListItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub content: Vec<Inline>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested: Option<List>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inline {
    Text(TextRun),
    Link { url: String, children: Vec<TextRun> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    #[serde(default, skip_serializing_if = "MarkSet::is_empty")]
    pub marks: MarkSet,
}

impl Block {
    pub fn paragraph(content: Vec<Inline>) -> Self {
        Block::Paragraph { content }
    }

    pub fn heading(level: u8, content: Vec<Inline>) -> Self {
        Block::Heading { level, content }
    }

    pub fn quote(content: Vec<Inline>) -> Self {
        Block::Quote { content }
    }

    pub fn list(kind: ListKind, items: Vec<ListItem>) -> Self {
        Block::List(List { kind, items })
    }

    pub fn code(language: impl Into<String>, code: impl Into<String>) -> Self {
        Block::CodeBlock {
            language: language.into(),
            code: code.into(),
        }
    }

    pub fn image(src: impl Into<String>, alt: impl Into<String>) -> Self {
        Block::Image {
            src: src.into(),
            alt: alt.into(),
        }
    }

    pub fn video(src: impl Into<String>) -> Self {
        Block::Video { src: src.into() }
    }
}

impl List {
    pub fn new(kind: ListKind, items: Vec<ListItem>) -> Self {
        Self { kind, items }
    }
}

impl ListItem {
    pub fn new(content: Vec<Inline>) -> Self {
        Self {
            content,
            nested: None,
        }
    }

    pub fn with_nested(mut self, list: List) -> Self {
        self.nested = Some(list);
        self
    }
}

impl Inline {
    pub fn text(text: impl Into<String>) -> Self {
        Inline::Text(TextRun::plain(text))
    }

    pub fn marked(text: impl Into<String>, marks: MarkSet) -> Self {
        Inline::Text(TextRun::new(text, marks))
    }

    pub fn link(url: impl Into<String>, children: Vec<TextRun>) -> Self {
        Inline::Link {
            url: url.into(),
            children,
        }
    }
}

impl TextRun {
    pub fn new(text: impl Into<String>, marks: MarkSet) -> Self {
        Self {
            text: text.into(),
            marks,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, MarkSet::EMPTY)
    }
}

/// Concatenated display text of a sequence of inlines.
pub fn inline_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        match inline {
            Inline::Text(run) => out.push_str(&run.text),
            Inline::Link { children, .. } => {
                for run in children {
                    out.push_str(&run.text);
                }
            }
        }
    }
    out
}

/// Merge adjacent runs that carry identical marks and drop empty runs.
pub fn normalize_runs(runs: Vec<TextRun>) -> Vec<TextRun> {
    let mut out: Vec<TextRun> = Vec::with_capacity(runs.len());
    for run in runs {
        if run.text.is_empty() {
            continue;
        }
        match out.last_mut() {
            Some(prev) if prev.marks == run.marks => prev.text.push_str(&run.text),
            _ => out.push(run),
        }
    }
    out
}

/// Canonical form of inline content: merged runs, no empty runs, no empty links.
pub fn normalize_inlines(inlines: Vec<Inline>) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::with_capacity(inlines.len());
    for inline in inlines {
        match inline {
            Inline::Text(run) => {
                if run.text.is_empty() {
                    continue;
                }
                match out.last_mut() {
                    Some(Inline::Text(prev)) if prev.marks == run.marks => {
                        prev.text.push_str(&run.text)
                    }
                    _ => out.push(Inline::Text(run)),
                }
            }
            Inline::Link { url, children } => {
                let children = normalize_runs(children);
                if !children.is_empty() {
                    out.push(Inline::Link { url, children });
                }
            }
        }
    }
    out
}
