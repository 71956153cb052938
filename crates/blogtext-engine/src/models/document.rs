//! # Document Arena
//!
//! The document is a flat map from [`NodeKey`] to node records. Parent and
//! child links are keys rather than owning pointers, so a stale key is just a
//! failed lookup and cloning a document is a plain copy of the map.
//!
//! ```text
//! Root
//! ├── Heading { level: 2 }
//! │   └── Text "Title"
//! ├── Paragraph
//! │   ├── Text "See "
//! │   └── Link { url }
//! │       └── Text "docs"
//! └── List { kind: Bullet }
//!     └── ListItem
//!         ├── Text "item"
//!         └── List { kind: Number }   (nested list, sole non-inline child)
//! ```
//!
//! Mutation primitives are crate-private: outside the crate a document changes
//! only through [`Editor`](crate::Editor) commands, each of which works on a copy
//! and commits it whole.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::blocks::{Block, Inline, List, ListItem, TextRun, normalize_inlines};
use super::node::{Node, NodeKey, NodeKind};
use super::selection::{Point, char_len};

static NEXT_DOCUMENT: AtomicU64 = AtomicU64::new(1);

/// Identity of a document, shared by every state derived from it by editing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocumentId(u64);

impl DocumentId {
    fn next() -> Self {
        Self(NEXT_DOCUMENT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone)]
struct Slot {
    node: Node,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
}

#[derive(Debug, Clone)]
pub struct Document {
    id: DocumentId,
    root: NodeKey,
    slots: HashMap<NodeKey, Slot>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document (fresh authoring).
    pub fn new() -> Self {
        let root = NodeKey::next();
        let mut slots = HashMap::new();
        slots.insert(
            root,
            Slot {
                node: Node::Root,
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            id: DocumentId::next(),
            root,
            slots,
        }
    }

    /// Build a document containing exactly the given blocks.
    pub fn from_blocks(blocks: &[Block]) -> Self {
        let mut doc = Self::new();
        let root = doc.root;
        for (index, block) in blocks.iter().enumerate() {
            doc.insert_block(root, index, block);
        }
        doc
    }

    /// Key-free snapshot of the document in canonical form.
    pub fn to_blocks(&self) -> Vec<Block> {
        self.blocks()
            .iter()
            .filter_map(|key| self.block_at(*key))
            .collect()
    }

    /// Key-free snapshot of a single block node.
    pub fn block_at(&self, key: NodeKey) -> Option<Block> {
        match self.get(key)? {
            Node::Paragraph => Some(Block::Paragraph {
                content: self.inlines_of(key),
            }),
            Node::Heading { level } => Some(Block::Heading {
                level: *level,
                content: self.inlines_of(key),
            }),
            Node::Quote => Some(Block::Quote {
                content: self.inlines_of(key),
            }),
            Node::List { .. } => self.list_at(key).map(Block::List),
            Node::CodeBlock { language, code } => Some(Block::CodeBlock {
                language: language.clone(),
                code: code.clone(),
            }),
            Node::Image { src, alt } => Some(Block::Image {
                src: src.clone(),
                alt: alt.clone(),
            }),
            Node::Video { src } => Some(Block::Video { src: src.clone() }),
            Node::Root | Node::ListItem | Node::Text { .. } | Node::Link { .. } => None,
        }
    }

    fn list_at(&self, key: NodeKey) -> Option<List> {
        let Node::List { kind } = self.get(key)? else {
            return None;
        };
        let items = self
            .children(key)
            .iter()
            .filter_map(|item| self.list_item_at(*item))
            .collect();
        Some(List { kind: *kind, items })
    }

    fn list_item_at(&self, key: NodeKey) -> Option<ListItem> {
        if !matches!(self.get(key)?, Node::ListItem) {
            return None;
        }
        let nested = self
            .children(key)
            .iter()
            .find_map(|child| self.list_at(*child));
        Some(ListItem {
            content: self.inlines_of(key),
            nested,
        })
    }

    /// Canonical inline content of an inline-holding element.
    pub fn inlines_of(&self, key: NodeKey) -> Vec<Inline> {
        let mut out = Vec::new();
        for child in self.children(key) {
            match self.get(*child) {
                Some(Node::Text { text, marks }) => {
                    out.push(Inline::Text(TextRun::new(text.clone(), *marks)))
                }
                Some(Node::Link { url }) => out.push(Inline::Link {
                    url: url.clone(),
                    children: self.runs_of(*child),
                }),
                _ => {}
            }
        }
        normalize_inlines(out)
    }

    fn runs_of(&self, key: NodeKey) -> Vec<TextRun> {
        self.children(key)
            .iter()
            .filter_map(|child| match self.get(*child) {
                Some(Node::Text { text, marks }) => Some(TextRun::new(text.clone(), *marks)),
                _ => None,
            })
            .collect()
    }

    // --- structural queries ---

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Top-level blocks in order.
    pub fn blocks(&self) -> &[NodeKey] {
        self.children(self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.blocks().is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.slots.get(&key).map(|slot| &slot.node)
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.slots.contains_key(&key)
    }

    pub fn kind(&self, key: NodeKey) -> Option<NodeKind> {
        self.get(key).map(Node::kind)
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.slots.get(&key).and_then(|slot| slot.parent)
    }

    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.slots
            .get(&key)
            .map(|slot| slot.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn index_in_parent(&self, key: NodeKey) -> Option<usize> {
        let parent = self.parent(key)?;
        self.children(parent).iter().position(|k| *k == key)
    }

    /// Nearest node of `kind` walking up from `key`, including `key` itself.
    pub fn nearest_ancestor(&self, key: NodeKey, kind: NodeKind) -> Option<NodeKey> {
        let mut current = Some(key);
        while let Some(k) = current {
            if self.kind(k)? == kind {
                return Some(k);
            }
            current = self.parent(k);
        }
        None
    }

    /// The root child containing `key` (`key` itself when it is top-level).
    pub fn top_level_block(&self, key: NodeKey) -> Option<NodeKey> {
        if key == self.root || !self.contains(key) {
            return None;
        }
        let mut current = key;
        loop {
            let parent = self.parent(current)?;
            if parent == self.root {
                return Some(current);
            }
            current = parent;
        }
    }

    /// Child-index path from the root. Document order is the lexicographic
    /// order of paths.
    pub fn path(&self, key: NodeKey) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut current = key;
        while current != self.root {
            path.push(self.index_in_parent(current)?);
            current = self.parent(current)?;
        }
        path.reverse();
        Some(path)
    }

    /// Descendants of `key` in pre-order, excluding `key`.
    pub fn descendants(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeKey> = self.children(key).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Every Text node in document order.
    pub fn text_nodes(&self) -> Vec<NodeKey> {
        self.descendants(self.root)
            .into_iter()
            .filter(|k| matches!(self.get(*k), Some(Node::Text { .. })))
            .collect()
    }

    /// Plain text of a node. Block-level children are joined with newlines.
    pub fn text_content(&self, key: NodeKey) -> String {
        match self.get(key) {
            Some(Node::Text { text, .. }) => text.clone(),
            Some(Node::CodeBlock { code, .. }) => code.clone(),
            Some(Node::Image { .. }) | Some(Node::Video { .. }) | None => String::new(),
            Some(Node::Root) | Some(Node::List { .. }) => self
                .children(key)
                .iter()
                .map(|child| self.text_content(*child))
                .collect::<Vec<_>>()
                .join("\n"),
            Some(_) => {
                let mut out = String::new();
                for child in self.children(key) {
                    if matches!(self.get(*child), Some(Node::List { .. })) {
                        out.push('\n');
                    }
                    out.push_str(&self.text_content(*child));
                }
                out
            }
        }
    }

    /// Earliest caret position inside `key`.
    pub fn start_of(&self, key: NodeKey) -> Option<Point> {
        match self.get(key)? {
            Node::Text { .. } | Node::CodeBlock { .. } => Some(Point::new(key, 0)),
            Node::Image { .. } | Node::Video { .. } => {
                Some(Point::new(self.parent(key)?, self.index_in_parent(key)?))
            }
            _ => match self.children(key).first() {
                Some(first) => self.start_of(*first),
                None => Some(Point::new(key, 0)),
            },
        }
    }

    /// Latest caret position inside `key`.
    pub fn end_of(&self, key: NodeKey) -> Option<Point> {
        match self.get(key)? {
            Node::Text { text, .. } => Some(Point::new(key, char_len(text))),
            Node::CodeBlock { code, .. } => Some(Point::new(key, char_len(code))),
            Node::Image { .. } | Node::Video { .. } => {
                Some(Point::new(self.parent(key)?, self.index_in_parent(key)? + 1))
            }
            _ => match self.children(key).last() {
                Some(last) => self.end_of(*last),
                None => Some(Point::new(key, 0)),
            },
        }
    }

    // --- mutation primitives ---

    pub(crate) fn node_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.slots.get_mut(&key).map(|slot| &mut slot.node)
    }

    pub(crate) fn set_node(&mut self, key: NodeKey, node: Node) -> bool {
        match self.slots.get_mut(&key) {
            Some(slot) => {
                slot.node = node;
                true
            }
            None => false,
        }
    }

    /// Insert a childless node under `parent` at `index` (clamped).
    pub(crate) fn insert(&mut self, parent: NodeKey, index: usize, node: Node) -> NodeKey {
        let key = NodeKey::next();
        self.slots.insert(
            key,
            Slot {
                node,
                parent: None,
                children: Vec::new(),
            },
        );
        self.attach(key, parent, index);
        key
    }

    pub(crate) fn insert_block(&mut self, parent: NodeKey, index: usize, block: &Block) -> NodeKey {
        match block {
            Block::Paragraph { content } => {
                let key = self.insert(parent, index, Node::Paragraph);
                self.insert_inlines(key, 0, content);
                key
            }
            Block::Heading { level, content } => {
                let key = self.insert(parent, index, Node::Heading { level: *level });
                self.insert_inlines(key, 0, content);
                key
            }
            Block::Quote { content } => {
                let key = self.insert(parent, index, Node::Quote);
                self.insert_inlines(key, 0, content);
                key
            }
            Block::List(list) => self.insert_list(parent, index, list),
            Block::CodeBlock { language, code } => self.insert(
                parent,
                index,
                Node::CodeBlock {
                    language: language.clone(),
                    code: code.clone(),
                },
            ),
            Block::Image { src, alt } => self.insert(
                parent,
                index,
                Node::Image {
                    src: src.clone(),
                    alt: alt.clone(),
                },
            ),
            Block::Video { src } => self.insert(parent, index, Node::Video { src: src.clone() }),
        }
    }

    pub(crate) fn insert_list(&mut self, parent: NodeKey, index: usize, list: &List) -> NodeKey {
        let key = self.insert(parent, index, Node::List { kind: list.kind });
        for (i, item) in list.items.iter().enumerate() {
            let item_key = self.insert(key, i, Node::ListItem);
            let count = self.insert_inlines(item_key, 0, &item.content).len();
            if let Some(nested) = &item.nested {
                self.insert_list(item_key, count, nested);
            }
        }
        key
    }

    pub(crate) fn insert_inlines(
        &mut self,
        parent: NodeKey,
        index: usize,
        inlines: &[Inline],
    ) -> Vec<NodeKey> {
        let mut keys = Vec::with_capacity(inlines.len());
        for (offset, inline) in inlines.iter().enumerate() {
            let at = index + offset;
            let key = match inline {
                Inline::Text(run) => self.insert(
                    parent,
                    at,
                    Node::Text {
                        text: run.text.clone(),
                        marks: run.marks,
                    },
                ),
                Inline::Link { url, children } => {
                    let link = self.insert(parent, at, Node::Link { url: url.clone() });
                    for (i, run) in children.iter().enumerate() {
                        self.insert(
                            link,
                            i,
                            Node::Text {
                                text: run.text.clone(),
                                marks: run.marks,
                            },
                        );
                    }
                    link
                }
            };
            keys.push(key);
        }
        keys
    }

    /// Unlink `key` from its parent, keeping its subtree alive.
    /// Returns the index it occupied.
    pub(crate) fn detach(&mut self, key: NodeKey) -> Option<usize> {
        let parent = self.parent(key)?;
        let index = self.index_in_parent(key)?;
        if let Some(slot) = self.slots.get_mut(&parent) {
            slot.children.remove(index);
        }
        if let Some(slot) = self.slots.get_mut(&key) {
            slot.parent = None;
        }
        Some(index)
    }

    /// Link a detached node under `parent` at `index` (clamped).
    pub(crate) fn attach(&mut self, key: NodeKey, parent: NodeKey, index: usize) {
        let Some(parent_slot) = self.slots.get_mut(&parent) else {
            log::debug!("attach: parent {parent} does not exist");
            return;
        };
        let index = index.min(parent_slot.children.len());
        parent_slot.children.insert(index, key);
        if let Some(slot) = self.slots.get_mut(&key) {
            slot.parent = Some(parent);
        }
    }

    pub(crate) fn move_node(&mut self, key: NodeKey, parent: NodeKey, index: usize) {
        self.detach(key);
        self.attach(key, parent, index);
    }

    /// Remove `key` and its whole subtree.
    pub(crate) fn remove(&mut self, key: NodeKey) {
        if key == self.root {
            return;
        }
        let doomed = self.descendants(key);
        self.detach(key);
        self.slots.remove(&key);
        for k in doomed {
            self.slots.remove(&k);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::node::{ListKind, Mark, MarkSet};
    use pretty_assertions::assert_eq;

    fn sample() -> Vec<Block> {
        vec![
            Block::heading(2, vec![Inline::text("Title")]),
            Block::paragraph(vec![
                Inline::text("See "),
                Inline::link("https://docs.rs", vec![TextRun::plain("docs")]),
            ]),
            Block::list(
                ListKind::Bullet,
                vec![
                    ListItem::new(vec![Inline::text("one")]).with_nested(List::new(
                        ListKind::Number,
                        vec![ListItem::new(vec![Inline::text("inner")])],
                    )),
                    ListItem::new(vec![Inline::text("two")]),
                ],
            ),
            Block::code("rust", "fn main() {}"),
            Block::image("https://x/img.png", "alt"),
        ]
    }

    #[test]
    fn from_blocks_and_back_is_identity() {
        let blocks = sample();
        let doc = Document::from_blocks(&blocks);
        assert_eq!(doc.to_blocks(), blocks);
        assert_eq!(doc.blocks().len(), 5);
    }

    #[test]
    fn structural_queries_follow_parent_links() {
        let doc = Document::from_blocks(&sample());
        let paragraph = doc.blocks()[1];
        let link = doc.children(paragraph)[1];
        let link_text = doc.children(link)[0];

        assert_eq!(doc.parent(link_text), Some(link));
        assert_eq!(doc.nearest_ancestor(link_text, NodeKind::Link), Some(link));
        assert_eq!(
            doc.nearest_ancestor(link_text, NodeKind::Paragraph),
            Some(paragraph)
        );
        assert_eq!(doc.nearest_ancestor(link_text, NodeKind::Heading), None);
        assert_eq!(doc.top_level_block(link_text), Some(paragraph));
        assert_eq!(doc.top_level_block(paragraph), Some(paragraph));
        assert_eq!(doc.top_level_block(doc.root()), None);
        assert_eq!(doc.path(link_text), Some(vec![1, 1, 0]));
        assert_eq!(doc.text_content(paragraph), "See docs");
    }

    #[test]
    fn nested_list_is_found_from_inner_text() {
        let doc = Document::from_blocks(&sample());
        let list = doc.blocks()[2];
        let first_item = doc.children(list)[0];
        let nested = doc.children(first_item)[1];
        let inner_text = doc.children(doc.children(nested)[0])[0];

        assert_eq!(doc.nearest_ancestor(inner_text, NodeKind::List), Some(nested));
        assert_eq!(doc.top_level_block(inner_text), Some(list));
        assert_eq!(doc.text_content(list), "one\ninner\ntwo");
    }

    #[test]
    fn removed_keys_no_longer_resolve() {
        let mut doc = Document::from_blocks(&sample());
        let paragraph = doc.blocks()[1];
        let link = doc.children(paragraph)[1];
        let link_text = doc.children(link)[0];

        doc.remove(paragraph);

        assert!(!doc.contains(paragraph));
        assert!(!doc.contains(link));
        assert!(!doc.contains(link_text));
        assert_eq!(doc.blocks().len(), 4);
    }

    #[test]
    fn keys_are_unique_across_documents() {
        let a = Document::from_blocks(&sample());
        let b = Document::from_blocks(&sample());
        assert_ne!(a.id(), b.id());
        for key in a.descendants(a.root()) {
            assert!(!b.contains(key));
        }
    }

    #[test]
    fn clone_keeps_identity_and_keys() {
        let doc = Document::from_blocks(&sample());
        let copy = doc.clone();
        assert_eq!(copy.id(), doc.id());
        assert_eq!(copy.blocks(), doc.blocks());
    }

    #[test]
    fn caret_bounds_of_media_sit_beside_the_leaf() {
        let doc = Document::from_blocks(&sample());
        let image = doc.blocks()[4];
        assert_eq!(doc.start_of(image), Some(Point::new(doc.root(), 4)));
        assert_eq!(doc.end_of(image), Some(Point::new(doc.root(), 5)));

        let bold = MarkSet::new().with(Mark::Bold);
        let doc = Document::from_blocks(&[Block::paragraph(vec![Inline::marked("héllo", bold)])]);
        let text = doc.children(doc.blocks()[0])[0];
        assert_eq!(doc.end_of(doc.blocks()[0]), Some(Point::new(text, 5)));
    }
}
