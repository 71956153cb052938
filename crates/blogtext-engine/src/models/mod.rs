pub mod blocks;
pub mod document;
pub mod language;
pub mod node;
pub mod selection;

pub use blocks::{Block, Inline, List, ListItem, TextRun, inline_text};
pub use document::{Document, DocumentId};
pub use language::LanguagePolicy;
pub use node::{ListKind, Mark, MarkSet, Node, NodeKey, NodeKind};
pub use selection::{Point, Selection, compare_points};
