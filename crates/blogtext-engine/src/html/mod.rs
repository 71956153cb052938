//! HTML import and export.
//!
//! Export emits semantic tags (`strong`, `em`, `code`, `a`, `pre`, ...) with
//! optional theme classes; persisted HTML is class-free. Import accepts both
//! the engine's own output and arbitrary pasted markup.

pub mod dom;
pub mod export;
pub mod import;
pub mod lexer;

pub use export::{ExportTheme, strip_classes, to_html, to_themed_html, write_html};
pub use import::parse_html;

use crate::models::{Document, LanguagePolicy};

/// Deserialize persisted HTML. Never fails: unknown markup is flattened to text.
pub fn from_html(html: &str, policy: &LanguagePolicy) -> Document {
    Document::from_blocks(&parse_html(html, policy))
}
