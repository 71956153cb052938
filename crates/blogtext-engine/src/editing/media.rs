use serde::{Deserialize, Serialize};

use crate::editing::commands::Outcome;
use crate::editing::range::{delete_range, inline_container, settle, split_text};
use crate::error::ValidationError;
use crate::models::selection::{char_len, split_chars};
use crate::models::{Document, Node, NodeKey, Point, Selection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

const IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];
const VIDEO_TYPES: [&str; 3] = ["video/mp4", "video/webm", "video/ogg"];

impl MediaKind {
    /// Classify an uploaded file by MIME type.
    pub fn from_mime(mime: &str) -> Result<Self, ValidationError> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if IMAGE_TYPES.contains(&essence.as_str()) {
            Ok(MediaKind::Image)
        } else if VIDEO_TYPES.contains(&essence.as_str()) {
            Ok(MediaKind::Video)
        } else {
            Err(ValidationError::UnsupportedMediaType(mime.to_string()))
        }
    }
}

/// Insert an Image or Video leaf at the selection.
///
/// The leaf always lands at the top level: a paragraph, heading or quote is
/// split around it, code is split into two blocks, and inside a list the
/// leaf goes after the whole list.
pub(crate) fn insert_leaf(doc: &mut Document, selection: &Selection, leaf: Node) -> Outcome {
    let caret = if selection.is_collapsed() {
        settle(doc, selection.anchor)
    } else {
        let (start, end) = selection.ordered(doc);
        delete_range(doc, start, end)
    };
    let root = doc.root();

    if caret.key == root {
        let at = caret.offset.min(doc.blocks().len());
        doc.insert(root, at, leaf);
        return Outcome::Mutated(Selection::caret(Point::new(root, at + 1)));
    }

    let Some(block) = doc.top_level_block(caret.key) else {
        return Outcome::Unchanged;
    };
    let Some(index) = doc.index_in_parent(block) else {
        return Outcome::Unchanged;
    };

    match doc.get(block).cloned() {
        Some(Node::CodeBlock { language, code }) => {
            let offset = caret.offset.min(char_len(&code));
            if caret.key != block || offset == char_len(&code) {
                doc.insert(root, index + 1, leaf);
                return Outcome::Mutated(Selection::caret(Point::new(root, index + 2)));
            }
            if offset == 0 {
                doc.insert(root, index, leaf);
                return Outcome::Mutated(Selection::caret(Point::new(block, 0)));
            }
            let (head, tail) = split_chars(&code, offset);
            let tail = tail.to_string();
            if let Some(Node::CodeBlock { code, .. }) = doc.node_mut(block) {
                *code = head.to_string();
            }
            doc.insert(root, index + 1, leaf);
            let rest = doc.insert(root, index + 2, Node::CodeBlock { language, code: tail });
            Outcome::Mutated(Selection::caret(Point::new(rest, 0)))
        }
        Some(Node::List { .. }) => {
            doc.insert(root, index + 1, leaf);
            Outcome::Mutated(Selection::caret(Point::new(root, index + 2)))
        }
        Some(node) if node.holds_inlines() => {
            let Some(split_at) = split_index(doc, caret, block) else {
                return Outcome::Unchanged;
            };
            split_block_around(doc, block, index, split_at, node, leaf)
        }
        _ => {
            doc.insert(root, index + 1, leaf);
            Outcome::Mutated(Selection::caret(Point::new(root, index + 2)))
        }
    }
}

/// Child index of `block` at which the caret divides it, splitting the
/// caret's run (and the Link around it) as needed.
fn split_index(doc: &mut Document, caret: Point, block: NodeKey) -> Option<usize> {
    if caret.key == block {
        return Some(caret.offset);
    }
    let container = inline_container(doc, caret.key)?;
    if container != block {
        return None;
    }

    let (inner, inner_index) = if matches!(doc.get(caret.key)?, Node::Text { .. }) {
        let index = doc.index_in_parent(caret.key)?;
        split_text(doc, caret.key, caret.offset);
        let past = caret.offset > 0;
        (doc.parent(caret.key)?, if past { index + 1 } else { index })
    } else {
        (caret.key, caret.offset)
    };
    if inner == block {
        return Some(inner_index);
    }

    // The caret sits inside a Link: cut the Link in two at the same place.
    let link_index = doc.index_in_parent(inner)?;
    let children = doc.children(inner).to_vec();
    if inner_index == 0 {
        return Some(link_index);
    }
    if inner_index >= children.len() {
        return Some(link_index + 1);
    }
    let url = match doc.get(inner)? {
        Node::Link { url } => url.clone(),
        _ => return None,
    };
    let twin = doc.insert(block, link_index + 1, Node::Link { url });
    for (i, child) in children[inner_index..].iter().enumerate() {
        doc.move_node(*child, twin, i);
    }
    Some(link_index + 1)
}

fn split_block_around(
    doc: &mut Document,
    block: NodeKey,
    index: usize,
    split_at: usize,
    node: Node,
    leaf: Node,
) -> Outcome {
    let root = doc.root();
    let count = doc.children(block).len();

    if count == 0 {
        doc.insert(root, index, leaf);
        doc.remove(block);
        return Outcome::Mutated(Selection::caret(Point::new(root, index + 1)));
    }
    if split_at == 0 {
        doc.insert(root, index, leaf);
        let caret = doc.start_of(block).unwrap_or(Point::new(block, 0));
        return Outcome::Mutated(Selection::caret(caret));
    }
    if split_at >= count {
        doc.insert(root, index + 1, leaf);
        return Outcome::Mutated(Selection::caret(Point::new(root, index + 2)));
    }

    let tail: Vec<NodeKey> = doc.children(block)[split_at..].to_vec();
    doc.insert(root, index + 1, leaf);
    let rest = doc.insert(root, index + 2, node);
    for (i, child) in tail.into_iter().enumerate() {
        doc.move_node(child, rest, i);
    }
    let caret = doc.start_of(rest).unwrap_or(Point::new(rest, 0));
    Outcome::Mutated(Selection::caret(caret))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Block, Inline, ListItem, ListKind, TextRun};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn image() -> Node {
        Node::Image {
            src: "https://x/i.png".to_string(),
            alt: "i".to_string(),
        }
    }

    fn inserted(doc: &mut Document, selection: Selection) -> Selection {
        match insert_leaf(doc, &selection, image()) {
            Outcome::Mutated(selection) => selection,
            other => panic!("expected a mutation, got {other:?}"),
        }
    }

    #[rstest]
    #[case("image/png", Ok(MediaKind::Image))]
    #[case("image/webp", Ok(MediaKind::Image))]
    #[case("video/mp4", Ok(MediaKind::Video))]
    #[case("Video/WebM; codecs=vp9", Ok(MediaKind::Video))]
    #[case(
        "application/pdf",
        Err(ValidationError::UnsupportedMediaType("application/pdf".to_string()))
    )]
    fn mime_types_are_classified(
        #[case] mime: &str,
        #[case] expected: Result<MediaKind, ValidationError>,
    ) {
        assert_eq!(MediaKind::from_mime(mime), expected);
    }

    #[test]
    fn mid_paragraph_insert_splits_the_block() {
        let mut doc = Document::from_blocks(&[Block::heading(
            3,
            vec![Inline::text("before after")],
        )]);
        let text = doc.children(doc.blocks()[0])[0];
        let selection = inserted(&mut doc, Selection::caret(Point::new(text, 7)));

        assert_eq!(
            doc.to_blocks(),
            vec![
                Block::heading(3, vec![Inline::text("before ")]),
                Block::image("https://x/i.png", "i"),
                Block::heading(3, vec![Inline::text("after")]),
            ]
        );
        let rest = doc.children(doc.blocks()[2])[0];
        assert_eq!(selection.anchor, Point::new(rest, 0));
    }

    #[test]
    fn insert_inside_link_splits_the_link() {
        let mut doc = Document::from_blocks(&[Block::paragraph(vec![Inline::link(
            "https://x.dev",
            vec![TextRun::plain("abcd")],
        )])]);
        let link = doc.children(doc.blocks()[0])[0];
        let text = doc.children(link)[0];
        inserted(&mut doc, Selection::caret(Point::new(text, 2)));

        assert_eq!(
            doc.to_blocks(),
            vec![
                Block::paragraph(vec![Inline::link(
                    "https://x.dev",
                    vec![TextRun::plain("ab")]
                )]),
                Block::image("https://x/i.png", "i"),
                Block::paragraph(vec![Inline::link(
                    "https://x.dev",
                    vec![TextRun::plain("cd")]
                )]),
            ]
        );
    }

    #[test]
    fn end_of_paragraph_puts_leaf_after() {
        let mut doc = Document::from_blocks(&[Block::paragraph(vec![Inline::text("ab")])]);
        let text = doc.children(doc.blocks()[0])[0];
        let selection = inserted(&mut doc, Selection::caret(Point::new(text, 2)));

        assert_eq!(doc.blocks().len(), 2);
        assert_eq!(selection.anchor, Point::new(doc.root(), 2));
    }

    #[test]
    fn code_is_split_around_the_leaf() {
        let mut doc = Document::from_blocks(&[Block::code("sql", "select 1;\nselect 2;")]);
        let code = doc.blocks()[0];
        inserted(&mut doc, Selection::caret(Point::new(code, 10)));

        assert_eq!(
            doc.to_blocks(),
            vec![
                Block::code("sql", "select 1;\n"),
                Block::image("https://x/i.png", "i"),
                Block::code("sql", "select 2;"),
            ]
        );
    }

    #[test]
    fn inside_list_goes_after_the_list() {
        let mut doc = Document::from_blocks(&[Block::list(
            ListKind::Bullet,
            vec![ListItem::new(vec![Inline::text("item")])],
        )]);
        let list = doc.blocks()[0];
        let text = doc.children(doc.children(list)[0])[0];
        inserted(&mut doc, Selection::caret(Point::new(text, 2)));

        assert_eq!(doc.blocks()[0], list);
        assert_eq!(doc.kind(doc.blocks()[1]), Some(crate::models::NodeKind::Image));
    }
}
