//! Markdown persistence, the primary storage format for post content.
//!
//! Besides CommonMark paragraphs, headings, lists, quotes, fenced code and
//! inline `**bold**`/`_italic_`/`` `code` ``/links, two line-level extensions
//! carry the media leaves:
//!
//! - `![alt](src)` on a line of its own is an Image block
//! - `<VideoPlayer src="URL" />` on a line of its own is a Video block
//!
//! `from_markdown(to_markdown(doc))` reproduces `doc.to_blocks()` for any
//! document whose text runs do not start or end a bold/italic span with
//! whitespace and whose text contains no blank lines.

pub mod export;
pub mod import;
pub mod transformers;

pub use export::{write_inlines, write_markdown};
pub use import::parse_markdown;

use crate::models::{Document, LanguagePolicy};

/// Serialize a document to persisted Markdown.
pub fn to_markdown(doc: &Document) -> String {
    write_markdown(&doc.to_blocks())
}

/// Deserialize persisted Markdown. Never fails: unrecognized syntax ends up
/// as paragraph text.
pub fn from_markdown(markdown: &str, policy: &LanguagePolicy) -> Document {
    Document::from_blocks(&parse_markdown(markdown, policy))
}
