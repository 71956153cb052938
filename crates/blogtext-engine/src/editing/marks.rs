use crate::editing::commands::Outcome;
use crate::editing::range::{delete_range, settle, split_range, split_text, splice_code, touched_texts};
use crate::models::selection::{byte_index, char_len};
use crate::models::{Document, Mark, MarkSet, Node, Point, Selection};

/// Flip `mark`.
///
/// On a caret this only changes the marks the next typed text will carry.
/// On a range the runs under the edges are split and, if every covered run
/// already has the mark, it is removed from all of them; otherwise it is
/// added to all of them.
pub(crate) fn toggle_mark(doc: &mut Document, selection: &Selection, mark: Mark) -> Outcome {
    if selection.is_collapsed() {
        let caret = settle(doc, selection.anchor);
        let current = match doc.get(caret.key) {
            Some(Node::CodeBlock { .. }) | None => return Outcome::Unchanged,
            Some(Node::Text { marks, .. }) => selection.pending_marks.unwrap_or(*marks),
            Some(_) => selection.pending_marks.unwrap_or(MarkSet::EMPTY),
        };
        let mut next = selection.clone();
        next.pending_marks = Some(current.toggled(mark));
        return Outcome::Selection(next);
    }

    let (start, end) = selection.ordered(doc);
    let forward = start == selection.anchor;
    let (start, end) = split_range(doc, start, end);
    let covered = touched_texts(doc, start, end);
    if covered.is_empty() {
        return Outcome::Unchanged;
    }

    let remove = covered.iter().all(|key| {
        matches!(doc.get(*key), Some(Node::Text { marks, .. }) if marks.contains(mark))
    });
    for key in &covered {
        if let Some(Node::Text { marks, .. }) = doc.node_mut(*key) {
            *marks = if remove {
                marks.without(mark)
            } else {
                marks.with(mark)
            };
        }
    }

    let next = if forward {
        Selection::range(start, end)
    } else {
        Selection::range(end, start)
    };
    Outcome::Mutated(next)
}

/// Type `text` at the selection, replacing a ranged selection first.
pub(crate) fn insert_text(doc: &mut Document, selection: &Selection, text: &str) -> Outcome {
    if text.is_empty() {
        return Outcome::Unchanged;
    }
    let caret = if selection.is_collapsed() {
        settle(doc, selection.anchor)
    } else {
        let (start, end) = selection.ordered(doc);
        delete_range(doc, start, end)
    };
    let added = char_len(text);

    let landed = match doc.get(caret.key).cloned() {
        Some(Node::CodeBlock { .. }) => {
            splice_code(doc, caret.key, caret.offset, caret.offset, text);
            Point::new(caret.key, caret.offset + added)
        }
        Some(Node::Text { text: existing, marks }) => {
            let marks_wanted = selection.pending_marks.unwrap_or(marks);
            if marks_wanted == marks {
                let mut updated = existing.clone();
                let at = byte_index(&existing, caret.offset);
                updated.insert_str(at, text);
                doc.set_node(caret.key, Node::Text { text: updated, marks });
                Point::new(caret.key, caret.offset + added)
            } else {
                let Some((parent, index)) = doc.parent(caret.key).zip(doc.index_in_parent(caret.key)) else {
                    return Outcome::Unchanged;
                };
                split_text(doc, caret.key, caret.offset);
                let at = if caret.offset == 0 { index } else { index + 1 };
                let key = doc.insert(
                    parent,
                    at,
                    Node::Text {
                        text: text.to_string(),
                        marks: marks_wanted,
                    },
                );
                Point::new(key, added)
            }
        }
        Some(node) if node.holds_inlines() || matches!(node, Node::Link { .. }) => {
            let key = doc.insert(
                caret.key,
                caret.offset,
                Node::Text {
                    text: text.to_string(),
                    marks: selection.pending_marks.unwrap_or(MarkSet::EMPTY),
                },
            );
            Point::new(key, added)
        }
        Some(Node::Root) => {
            let paragraph = doc.insert(caret.key, caret.offset, Node::Paragraph);
            let key = doc.insert(
                paragraph,
                0,
                Node::Text {
                    text: text.to_string(),
                    marks: selection.pending_marks.unwrap_or(MarkSet::EMPTY),
                },
            );
            Point::new(key, added)
        }
        _ => {
            log::debug!("insert_text: caret at {} cannot take text", caret.key);
            return Outcome::Unchanged;
        }
    };

    Outcome::Mutated(Selection::caret(landed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Block, Inline};
    use pretty_assertions::assert_eq;

    fn bold() -> MarkSet {
        MarkSet::new().with(Mark::Bold)
    }

    fn changed(doc: &Document, outcome: Outcome) -> Selection {
        let selection = match outcome {
            Outcome::Mutated(selection) | Outcome::Selection(selection) => selection,
            Outcome::Unchanged => panic!("expected a change"),
        };
        assert!(selection.is_live(doc), "selection must point into the document");
        selection
    }

    #[test]
    fn partial_coverage_adds_to_all() {
        let mut doc = Document::from_blocks(&[Block::paragraph(vec![
            Inline::text("plain "),
            Inline::marked("bold", bold()),
        ])]);
        let plain = doc.children(doc.blocks()[0])[0];
        let strong = doc.children(doc.blocks()[0])[1];
        let selection = Selection::range(Point::new(plain, 2), Point::new(strong, 2));

        let outcome = toggle_mark(&mut doc, &selection, Mark::Bold);
        changed(&doc, outcome);

        assert_eq!(
            doc.to_blocks(),
            vec![Block::paragraph(vec![
                Inline::text("pl"),
                Inline::marked("ain bold", bold()),
            ])]
        );
    }

    #[test]
    fn toggling_full_coverage_twice_restores_marks() {
        let original = vec![Block::paragraph(vec![
            Inline::text("a "),
            Inline::marked("bold", bold()),
            Inline::text(" b"),
        ])];
        let mut doc = Document::from_blocks(&original);
        let strong = doc.children(doc.blocks()[0])[1];
        let selection = Selection::range(Point::new(strong, 0), Point::new(strong, 4));

        let outcome = toggle_mark(&mut doc, &selection, Mark::Bold);
        let once = changed(&doc, outcome);
        assert_eq!(
            doc.to_blocks(),
            vec![Block::paragraph(vec![Inline::text("a bold b")])]
        );
        let outcome = toggle_mark(&mut doc, &once, Mark::Bold);
        changed(&doc, outcome);
        assert_eq!(doc.to_blocks(), original);
    }

    #[test]
    fn caret_toggle_sets_pending_marks_only() {
        let mut doc = Document::from_blocks(&[Block::paragraph(vec![Inline::text("ab")])]);
        let text = doc.children(doc.blocks()[0])[0];
        let before = doc.to_blocks();

        let outcome = toggle_mark(&mut doc, &Selection::caret(Point::new(text, 1)), Mark::Italic);
        let Outcome::Selection(selection) = outcome else {
            panic!("caret toggle must only touch the selection");
        };
        assert_eq!(
            selection.pending_marks,
            Some(MarkSet::new().with(Mark::Italic))
        );
        assert_eq!(doc.to_blocks(), before);

        let typed = insert_text(&mut doc, &selection, "X");
        changed(&doc, typed);
        assert_eq!(
            doc.to_blocks(),
            vec![Block::paragraph(vec![
                Inline::text("a"),
                Inline::marked("X", MarkSet::new().with(Mark::Italic)),
                Inline::text("b"),
            ])]
        );
    }

    #[test]
    fn caret_in_code_block_is_a_no_op() {
        let mut doc = Document::from_blocks(&[Block::code("go", "fmt.Println()")]);
        let code = doc.blocks()[0];
        let outcome = toggle_mark(&mut doc, &Selection::caret(Point::new(code, 3)), Mark::Bold);
        assert_eq!(outcome, Outcome::Unchanged);
    }

    #[test]
    fn insert_text_into_code_is_verbatim() {
        let mut doc = Document::from_blocks(&[Block::code("go", "ab")]);
        let code = doc.blocks()[0];
        let outcome = insert_text(&mut doc, &Selection::caret(Point::new(code, 1)), "**x**");
        let selection = changed(&doc, outcome);
        assert_eq!(doc.to_blocks(), vec![Block::code("go", "a**x**b")]);
        assert_eq!(selection.anchor, Point::new(code, 6));
    }

    #[test]
    fn insert_text_on_empty_document_creates_paragraph() {
        let mut doc = Document::new();
        let root = doc.root();
        let outcome = insert_text(&mut doc, &Selection::caret(Point::new(root, 0)), "Hi");
        changed(&doc, outcome);
        assert_eq!(
            doc.to_blocks(),
            vec![Block::paragraph(vec![Inline::text("Hi")])]
        );
    }

    #[test]
    fn insert_text_replaces_a_range() {
        let mut doc = Document::from_blocks(&[Block::paragraph(vec![Inline::text("Hello world")])]);
        let text = doc.children(doc.blocks()[0])[0];
        let selection = Selection::range(Point::new(text, 6), Point::new(text, 11));
        let outcome = insert_text(&mut doc, &selection, "Rust");
        changed(&doc, outcome);
        assert_eq!(
            doc.to_blocks(),
            vec![Block::paragraph(vec![Inline::text("Hello Rust")])]
        );
    }
}
