use serde::{Deserialize, Serialize};

use crate::models::{ListKind, Mark, NodeKey};

/// Commands that can be applied to the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Cmd {
    ToggleMark {
        mark: Mark,
    },
    SetBlockType {
        block: BlockType,
    },
    /// `None` unwraps the touched list back into paragraphs.
    SetListType {
        kind: Option<ListKind>,
    },
    SetLink {
        url: String,
        label: String,
        target: LinkTarget,
    },
    RemoveLink {
        key: NodeKey,
    },
    InsertImage {
        src: String,
        alt: String,
    },
    InsertVideo {
        src: String,
    },
    SetCodeLanguage {
        key: NodeKey,
        language: String,
    },
    InsertText {
        text: String,
    },
}

/// Block kinds a selection can be converted into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Paragraph,
    Heading(u8),
    Quote,
    CodeBlock { language: Option<String> },
}

/// What a `SetLink` command acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkTarget {
    Selection,
    Link(NodeKey),
}

/// Result of one command against a draft document.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    /// Nothing to do: stale key, code block, empty input.
    Unchanged,
    /// Only the selection moved (e.g. pending marks on a caret).
    Selection(crate::models::Selection),
    /// The draft changed and should be committed.
    Mutated(crate::models::Selection),
}
