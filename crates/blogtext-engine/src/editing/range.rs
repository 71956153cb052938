//! Range plumbing shared by the commands: splitting runs at range edges,
//! finding what a range covers, and deleting it.

use std::cmp::Ordering;

use crate::models::selection::{char_len, compare_points, position, span, split_chars};
use crate::models::{Document, Node, NodeKey, Point};

/// Split a Text node at `offset`. The original node keeps the left part;
/// returns the key of the new right part, or `None` when the offset falls on
/// an edge.
pub(crate) fn split_text(doc: &mut Document, key: NodeKey, offset: usize) -> Option<NodeKey> {
    let Some(Node::Text { text, marks }) = doc.get(key) else {
        return None;
    };
    if offset == 0 || offset >= char_len(text) {
        return None;
    }
    let (left, right) = split_chars(text, offset);
    let (left, right, marks) = (left.to_string(), right.to_string(), *marks);
    let parent = doc.parent(key)?;
    let index = doc.index_in_parent(key)?;
    doc.set_node(key, Node::Text { text: left, marks });
    Some(doc.insert(parent, index + 1, Node::Text { text: right, marks }))
}

/// Split the runs under both edges so the range starts and ends on run
/// boundaries. Returns the edges re-expressed against the split nodes.
pub(crate) fn split_range(doc: &mut Document, start: Point, end: Point) -> (Point, Point) {
    let mut start = start;
    let mut end = end;
    split_text(doc, end.key, end.offset);
    if let Some(right) = split_text(doc, start.key, start.offset) {
        if end.key == start.key {
            end = Point::new(right, end.offset - start.offset);
        }
        start = Point::new(right, 0);
    }
    (start, end)
}

/// Text nodes overlapping `[start, end)`, in document order.
pub(crate) fn touched_texts(doc: &Document, start: Point, end: Point) -> Vec<NodeKey> {
    let (Some(lo), Some(hi)) = (position(doc, start), position(doc, end)) else {
        return Vec::new();
    };
    if lo >= hi {
        return Vec::new();
    }
    doc.text_nodes()
        .into_iter()
        .filter(|key| match span(doc, *key) {
            Some((before, after)) => before < hi && after > lo,
            None => false,
        })
        .collect()
}

/// Top-level block a point belongs to. A root-level point belongs to the
/// block after it, or the block before it when it closes a range.
pub(crate) fn block_at_point(doc: &Document, point: Point, closes_range: bool) -> Option<NodeKey> {
    if point.key == doc.root() {
        let blocks = doc.blocks();
        let index = if closes_range {
            point.offset.saturating_sub(1)
        } else {
            point.offset
        };
        return blocks.get(index).or(blocks.last()).copied();
    }
    doc.top_level_block(point.key)
}

/// Top-level blocks from the one holding `start` through the one holding `end`.
pub(crate) fn touched_blocks(doc: &Document, start: Point, end: Point) -> Vec<NodeKey> {
    let collapsed = start == end;
    let Some(first) = block_at_point(doc, start, false) else {
        return Vec::new();
    };
    let last = block_at_point(doc, end, !collapsed).unwrap_or(first);
    let blocks = doc.blocks();
    let (Some(a), Some(b)) = (
        blocks.iter().position(|k| *k == first),
        blocks.iter().position(|k| *k == last),
    ) else {
        return vec![first];
    };
    if a > b {
        return vec![first];
    }
    blocks[a..=b].to_vec()
}

/// Move a caret that sits at an element boundary onto an adjacent Text node,
/// preferring the run before it.
pub(crate) fn settle(doc: &Document, point: Point) -> Point {
    match doc.get(point.key) {
        Some(node) if node.holds_inlines() || matches!(node, Node::Link { .. }) => {
            let children = doc.children(point.key);
            if point.offset > 0
                && let Some(prev) = children.get(point.offset - 1)
                && let Some(Node::Text { text, .. }) = doc.get(*prev)
            {
                return Point::new(*prev, char_len(text));
            }
            if let Some(next) = children.get(point.offset)
                && matches!(doc.get(*next), Some(Node::Text { .. }))
            {
                return Point::new(*next, 0);
            }
            point
        }
        _ => point,
    }
}

/// Nearest ancestor (inclusive) whose children are inline content.
pub(crate) fn inline_container(doc: &Document, key: NodeKey) -> Option<NodeKey> {
    let mut current = Some(key);
    while let Some(k) = current {
        if doc.get(k)?.holds_inlines() {
            return Some(k);
        }
        current = doc.parent(k);
    }
    None
}

/// Replace characters `from..to` of a CodeBlock's code with `insert`.
pub(crate) fn splice_code(doc: &mut Document, key: NodeKey, from: usize, to: usize, insert: &str) {
    if let Some(Node::CodeBlock { code, .. }) = doc.node_mut(key) {
        let (head, rest) = split_chars(code, from);
        let (_, tail) = split_chars(rest, to.saturating_sub(from));
        *code = format!("{head}{insert}{tail}");
    }
}

/// Remove a Text node, and its Link parent if that leaves the Link empty.
pub(crate) fn remove_text(doc: &mut Document, key: NodeKey) {
    let parent = doc.parent(key);
    doc.remove(key);
    if let Some(parent) = parent
        && matches!(doc.get(parent), Some(Node::Link { .. }))
        && doc.children(parent).is_empty()
    {
        doc.remove(parent);
    }
}

/// Delete everything between `start` and `end` (in document order) and return
/// the caret where the range used to start.
///
/// Top-level blocks the range covers entirely are removed. Partially covered
/// code is trimmed. When the range spans two inline blocks the tail of the
/// last one is joined onto the first.
pub(crate) fn delete_range(doc: &mut Document, start: Point, end: Point) -> Point {
    if compare_points(doc, start, end) != Ordering::Less {
        return start;
    }

    if start.key == end.key
        && let Some(Node::CodeBlock { .. }) = doc.get(start.key)
    {
        splice_code(doc, start.key, start.offset, end.offset, "");
        return start;
    }

    let start_block = block_at_point(doc, start, false);
    let end_block = block_at_point(doc, end, true);
    let root_fallback = start_block
        .and_then(|b| doc.index_in_parent(b))
        .unwrap_or(doc.blocks().len());
    let end_container = inline_container(doc, end.key);

    let (lo, hi) = match (position(doc, start), position(doc, end)) {
        (Some(lo), Some(hi)) => (lo, hi),
        _ => return start,
    };
    let covered_blocks: Vec<NodeKey> = doc
        .blocks()
        .iter()
        .copied()
        .filter(|b| match span(doc, *b) {
            Some((before, after)) => before >= lo && after <= hi,
            None => false,
        })
        .collect();

    if let Some(Node::CodeBlock { code, .. }) = doc.get(start.key) {
        let len = char_len(code);
        splice_code(doc, start.key, start.offset, len, "");
    }
    if let Some(Node::CodeBlock { .. }) = doc.get(end.key) {
        splice_code(doc, end.key, 0, end.offset, "");
    }

    let (start, end) = split_range(doc, start, end);
    let caret = match doc.get(start.key) {
        Some(Node::Text { .. }) => {
            let past = usize::from(start.offset > 0);
            doc.parent(start.key)
                .zip(doc.index_in_parent(start.key))
                .map(|(parent, index)| Point::new(parent, index + past))
        }
        Some(_) => Some(start),
        None => None,
    };

    // Where the caret lands if its own container is deleted with the range.
    let outer = caret.and_then(|point| {
        doc.parent(point.key)
            .zip(doc.index_in_parent(point.key))
            .map(|(parent, index)| Point::new(parent, index))
    });

    for key in touched_texts(doc, start, end) {
        remove_text(doc, key);
    }
    for block in &covered_blocks {
        doc.remove(*block);
    }

    let caret = match (caret, outer) {
        (Some(point), _) if doc.contains(point.key) => clamp(doc, point),
        (_, Some(point)) if doc.contains(point.key) => clamp(doc, point),
        _ => Point::new(doc.root(), root_fallback.min(doc.blocks().len())),
    };

    if start_block != end_block {
        join_blocks(doc, caret, end_container);
    }

    settle(doc, caret)
}

fn clamp(doc: &Document, point: Point) -> Point {
    match doc.get(point.key) {
        Some(Node::CodeBlock { code, .. }) => Point::new(point.key, point.offset.min(char_len(code))),
        _ => Point::new(point.key, point.offset.min(doc.children(point.key).len())),
    }
}

/// Pull the inline content left in `tail` onto the end of the block holding
/// `caret`, then drop whatever `tail` leaves empty.
fn join_blocks(doc: &mut Document, caret: Point, tail: Option<NodeKey>) {
    let Some(tail) = tail.filter(|t| doc.contains(*t)) else {
        return;
    };
    let Some(head) = inline_container(doc, caret.key) else {
        return;
    };
    if head == tail {
        return;
    }
    let moving: Vec<NodeKey> = doc
        .children(tail)
        .iter()
        .copied()
        .filter(|k| doc.get(*k).is_some_and(Node::is_inline))
        .collect();
    for key in moving {
        let index = doc.children(head).len();
        doc.move_node(key, head, index);
    }

    if !doc.children(tail).is_empty() {
        return;
    }
    let parent = doc.parent(tail);
    doc.remove(tail);
    if let Some(list) = parent.filter(|p| matches!(doc.get(*p), Some(Node::List { .. })))
        && doc.children(list).is_empty()
    {
        doc.remove(list);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Block, Inline, Mark, MarkSet, TextRun};
    use pretty_assertions::assert_eq;

    fn two_paragraphs() -> Document {
        Document::from_blocks(&[
            Block::paragraph(vec![Inline::text("Hello world")]),
            Block::paragraph(vec![Inline::text("Second line")]),
        ])
    }

    #[test]
    fn split_range_inside_one_run() {
        let mut doc = two_paragraphs();
        let text = doc.children(doc.blocks()[0])[0];
        let (start, end) = split_range(&mut doc, Point::new(text, 2), Point::new(text, 5));

        let covered = touched_texts(&doc, start, end);
        assert_eq!(covered.len(), 1);
        assert_eq!(doc.text_content(covered[0]), "llo");
        assert_eq!(doc.text_content(doc.blocks()[0]), "Hello world");
        assert_eq!(doc.children(doc.blocks()[0]).len(), 3);
    }

    #[test]
    fn delete_within_a_run() {
        let mut doc = two_paragraphs();
        let text = doc.children(doc.blocks()[0])[0];
        let caret = delete_range(&mut doc, Point::new(text, 5), Point::new(text, 11));

        assert_eq!(doc.text_content(doc.blocks()[0]), "Hello");
        assert_eq!(caret, Point::new(text, 5));
    }

    #[test]
    fn delete_across_blocks_joins_them() {
        let mut doc = two_paragraphs();
        let first = doc.children(doc.blocks()[0])[0];
        let second = doc.children(doc.blocks()[1])[0];
        delete_range(&mut doc, Point::new(first, 5), Point::new(second, 6));

        assert_eq!(
            doc.to_blocks(),
            vec![Block::paragraph(vec![Inline::text("Hello line")])]
        );
    }

    #[test]
    fn delete_drops_covered_media_and_emptied_links() {
        let bold = MarkSet::new().with(Mark::Bold);
        let mut doc = Document::from_blocks(&[
            Block::paragraph(vec![
                Inline::text("keep "),
                Inline::link("https://x", vec![TextRun::new("gone", bold)]),
            ]),
            Block::image("https://x/a.png", "a"),
            Block::paragraph(vec![Inline::text("tail")]),
        ]);
        let first = doc.children(doc.blocks()[0])[0];
        let tail = doc.children(doc.blocks()[2])[0];
        let caret = delete_range(&mut doc, Point::new(first, 5), Point::new(tail, 0));

        assert_eq!(
            doc.to_blocks(),
            vec![Block::paragraph(vec![Inline::text("keep tail")])]
        );
        assert_eq!(caret, Point::new(first, 5));
    }

    #[test]
    fn touched_blocks_span_the_range() {
        let doc = two_paragraphs();
        let first = doc.children(doc.blocks()[0])[0];
        let second = doc.children(doc.blocks()[1])[0];
        assert_eq!(
            touched_blocks(&doc, Point::new(first, 3), Point::new(second, 1)),
            doc.blocks().to_vec()
        );
        assert_eq!(
            touched_blocks(&doc, Point::new(second, 1), Point::new(second, 1)),
            vec![doc.blocks()[1]]
        );
    }
}
