use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Stable identifier for a node, unique for the lifetime of the process.
///
/// A key stays valid until the node it names is structurally removed. Keys are
/// never reused, so a key captured before a mutation either still names the same
/// node or resolves to nothing.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey(u64);

impl NodeKey {
    pub(crate) fn next() -> Self {
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Character-level formatting attribute of a text run
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    Bold,
    Italic,
    Code,
}

impl Mark {
    pub const ALL: [Mark; 3] = [Mark::Bold, Mark::Italic, Mark::Code];

    fn bit(self) -> u8 {
        match self {
            Mark::Bold => 0b001,
            Mark::Italic => 0b010,
            Mark::Code => 0b100,
        }
    }
}

/// A set of [`Mark`]s, stored as a bitmask.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<Mark>", from = "Vec<Mark>")]
pub struct MarkSet(u8);

impl MarkSet {
    pub const EMPTY: MarkSet = MarkSet(0);

    pub fn new() -> Self {
        Self::EMPTY
    }

    pub fn contains(self, mark: Mark) -> bool {
        self.0 & mark.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn with(self, mark: Mark) -> Self {
        Self(self.0 | mark.bit())
    }

    pub fn without(self, mark: Mark) -> Self {
        Self(self.0 & !mark.bit())
    }

    pub fn toggled(self, mark: Mark) -> Self {
        Self(self.0 ^ mark.bit())
    }

    pub fn iter(self) -> impl Iterator<Item = Mark> {
        Mark::ALL.into_iter().filter(move |m| self.contains(*m))
    }
}

impl FromIterator<Mark> for MarkSet {
    fn from_iter<I: IntoIterator<Item = Mark>>(iter: I) -> Self {
        iter.into_iter().fold(MarkSet::EMPTY, MarkSet::with)
    }
}

impl From<Vec<Mark>> for MarkSet {
    fn from(marks: Vec<Mark>) -> Self {
        marks.into_iter().collect()
    }
}

impl From<MarkSet> for Vec<Mark> {
    fn from(set: MarkSet) -> Self {
        set.iter().collect()
    }
}

impl fmt::Debug for MarkSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Ordered (numbered) or unordered (bulleted) list
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Bullet,
    Number,
}

/// A node record in the document arena.
///
/// The node set is closed: every serializer matches on it exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Root,
    Paragraph,
    Heading { level: u8 },
    Quote,
    List { kind: ListKind },
    ListItem,
    /// Code is stored verbatim and never carries marks.
    CodeBlock { language: String, code: String },
    Image { src: String, alt: String },
    Video { src: String },
    Text { text: String, marks: MarkSet },
    Link { url: String },
}

/// Discriminant of [`Node`], used for ancestor queries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Root,
    Paragraph,
    Heading,
    Quote,
    List,
    ListItem,
    CodeBlock,
    Image,
    Video,
    Text,
    Link,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Root => NodeKind::Root,
            Node::Paragraph => NodeKind::Paragraph,
            Node::Heading { .. } => NodeKind::Heading,
            Node::Quote => NodeKind::Quote,
            Node::List { .. } => NodeKind::List,
            Node::ListItem => NodeKind::ListItem,
            Node::CodeBlock { .. } => NodeKind::CodeBlock,
            Node::Image { .. } => NodeKind::Image,
            Node::Video { .. } => NodeKind::Video,
            Node::Text { .. } => NodeKind::Text,
            Node::Link { .. } => NodeKind::Link,
        }
    }

    /// Image and Video: atomic leaves a cursor can only sit beside.
    pub fn is_media(&self) -> bool {
        matches!(self, Node::Image { .. } | Node::Video { .. })
    }

    /// Elements whose children are Text and Link nodes.
    pub fn holds_inlines(&self) -> bool {
        matches!(
            self,
            Node::Paragraph | Node::Heading { .. } | Node::Quote | Node::ListItem
        )
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Node::Text { .. } | Node::Link { .. })
    }
}
