pub mod editing;
pub mod error;
pub mod html;
pub mod markdown;
pub mod models;
pub mod outline;

// Re-export key types for easier usage
pub use editing::{
    BlockType, Cmd, Debouncer, EditTicket, Editor, FormatState, LinkTarget, MediaKind, Patch,
};
pub use error::{EngineError, ValidationError};
pub use html::{ExportTheme, from_html, to_html, to_themed_html};
pub use markdown::{from_markdown, to_markdown};
pub use models::{
    Block, Document, DocumentId, Inline, LanguagePolicy, List, ListItem, ListKind, Mark, MarkSet,
    Node, NodeKey, NodeKind, Point, Selection, TextRun,
};
pub use outline::{TocEntry, table_of_contents};
