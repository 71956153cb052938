use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::document::Document;
use super::node::{MarkSet, Node, NodeKey};

/// A position in the document.
///
/// For Text and CodeBlock nodes `offset` counts characters into the text. For
/// every other node it is a child index, so `(parent, i)` is the boundary just
/// before the parent's `i`-th child. Image and Video nodes are never the `key`
/// of a valid point; the cursor sits at a boundary of their parent instead.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub key: NodeKey,
    pub offset: usize,
}

impl Point {
    pub fn new(key: NodeKey, offset: usize) -> Self {
        Self { key, offset }
    }
}

/// Anchor/focus pair. A collapsed selection is a caret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
    /// Marks the next typed text will carry, set by toggling a mark on a caret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_marks: Option<MarkSet>,
}

impl Selection {
    pub fn caret(point: Point) -> Self {
        Self {
            anchor: point,
            focus: point,
            pending_marks: None,
        }
    }

    pub fn range(anchor: Point, focus: Point) -> Self {
        Self {
            anchor,
            focus,
            pending_marks: None,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// `(start, end)` in document order.
    pub fn ordered(&self, doc: &Document) -> (Point, Point) {
        match compare_points(doc, self.anchor, self.focus) {
            Ordering::Greater => (self.focus, self.anchor),
            _ => (self.anchor, self.focus),
        }
    }

    pub fn is_live(&self, doc: &Document) -> bool {
        is_valid_point(doc, self.anchor) && is_valid_point(doc, self.focus)
    }
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte index of the `offset`-th character, clamped to the end of `text`.
pub fn byte_index(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

pub fn split_chars(text: &str, offset: usize) -> (&str, &str) {
    text.split_at(byte_index(text, offset))
}

/// Whether `point` names a live node and an offset within its bounds.
pub fn is_valid_point(doc: &Document, point: Point) -> bool {
    match doc.get(point.key) {
        None => false,
        Some(Node::Text { text, .. }) => point.offset <= char_len(text),
        Some(Node::CodeBlock { code, .. }) => point.offset <= char_len(code),
        Some(node) if node.is_media() => false,
        Some(_) => point.offset <= doc.children(point.key).len(),
    }
}

/// Sort key for a point: the child-index path from the root, extended by the
/// offset. Points at either edge of a Text node collapse onto the boundary
/// between it and its siblings, so `(text, len)` and the point after the
/// text compare equal.
pub fn position(doc: &Document, point: Point) -> Option<Vec<usize>> {
    let mut path = doc.path(point.key)?;
    match doc.get(point.key)? {
        Node::Text { text, .. } => {
            if point.offset == 0 {
                return Some(path);
            }
            if point.offset >= char_len(text) {
                if let Some(last) = path.last_mut() {
                    *last += 1;
                }
                return Some(path);
            }
            path.push(point.offset);
        }
        Node::CodeBlock { .. } => {
            if point.offset > 0 {
                path.push(point.offset);
            }
        }
        _ => path.push(point.offset),
    }
    Some(path)
}

/// Boundary just before `key` and just after it, as sort keys.
pub(crate) fn span(doc: &Document, key: NodeKey) -> Option<(Vec<usize>, Vec<usize>)> {
    let before = doc.path(key)?;
    let mut after = before.clone();
    if let Some(last) = after.last_mut() {
        *last += 1;
    }
    Some((before, after))
}

/// Document order of two points. Points that no longer resolve sort last.
pub fn compare_points(doc: &Document, a: Point, b: Point) -> Ordering {
    match (position(doc, a), position(doc, b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
