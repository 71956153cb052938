//! Flattened "what is active here" snapshot for toolbars.
//!
//! [`resolve`] is a pure function of the document, the selection and the
//! language policy. The editor calls it after every committed change so the
//! snapshot never lags the document.

use serde::Serialize;

use crate::editing::range::{inline_container, settle, touched_texts};
use crate::models::selection::{char_len, position, span, split_chars};
use crate::models::{
    Document, LanguagePolicy, ListKind, Mark, MarkSet, Node, NodeKey, NodeKind, Point, Selection,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatState {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub block_kind: Option<NodeKind>,
    pub heading_level: Option<u8>,
    pub list_kind: Option<ListKind>,
    pub quote: bool,
    pub code_block_key: Option<NodeKey>,
    pub code_language: String,
    pub is_link: bool,
    pub link_url: Option<String>,
    pub link_label: Option<String>,
    pub link_key: Option<NodeKey>,
    pub selected_text: String,
}

impl FormatState {
    /// State reported when nothing is selected.
    pub fn empty(policy: &LanguagePolicy) -> Self {
        Self {
            bold: false,
            italic: false,
            code: false,
            block_kind: None,
            heading_level: None,
            list_kind: None,
            quote: false,
            code_block_key: None,
            code_language: policy.default_language().to_string(),
            is_link: false,
            link_url: None,
            link_label: None,
            link_key: None,
            selected_text: String::new(),
        }
    }

    pub fn has_mark(&self, mark: Mark) -> bool {
        match mark {
            Mark::Bold => self.bold,
            Mark::Italic => self.italic,
            Mark::Code => self.code,
        }
    }
}

pub fn resolve(doc: &Document, selection: &Selection, policy: &LanguagePolicy) -> FormatState {
    let mut state = FormatState::empty(policy);
    if !selection.is_live(doc) {
        return state;
    }

    let anchor = settle(doc, selection.anchor);
    let marks = active_marks(doc, selection, anchor);
    state.bold = marks.contains(Mark::Bold);
    state.italic = marks.contains(Mark::Italic);
    state.code = marks.contains(Mark::Code);

    // Block-level state follows the anchor alone, even for ranges that span
    // blocks of different kinds. A caret between top-level blocks has none.
    if let Some(block) = doc.top_level_block(anchor.key) {
        state.block_kind = doc.kind(block);
        state.quote = state.block_kind == Some(NodeKind::Quote);
        if let Some(Node::Heading { level }) = doc.get(block) {
            state.heading_level = Some(*level);
        }
    }
    if anchor.key != doc.root() {
        if let Some(list) = doc.nearest_ancestor(anchor.key, NodeKind::List)
            && let Some(Node::List { kind }) = doc.get(list)
        {
            state.list_kind = Some(*kind);
        }
        if let Some(Node::CodeBlock { language, .. }) = doc.get(anchor.key) {
            state.code_block_key = Some(anchor.key);
            state.code_language = policy.resolve(Some(language));
        }
    }

    if let Some(parent) = doc.parent(anchor.key)
        && let Some(Node::Link { url }) = doc.get(parent)
    {
        state.is_link = true;
        state.link_url = Some(url.clone());
        state.link_label = Some(doc.text_content(parent));
        state.link_key = Some(parent);
    }

    state.selected_text = selected_text(doc, selection);
    state
}

fn active_marks(doc: &Document, selection: &Selection, anchor: Point) -> MarkSet {
    let caret_marks = || match doc.get(anchor.key) {
        Some(Node::Text { marks, .. }) => *marks,
        _ => MarkSet::EMPTY,
    };

    if selection.is_collapsed() {
        if matches!(doc.get(anchor.key), Some(Node::CodeBlock { .. })) {
            return MarkSet::EMPTY;
        }
        return selection.pending_marks.unwrap_or_else(caret_marks);
    }

    let (start, end) = selection.ordered(doc);
    let touched = touched_texts(doc, start, end);
    if touched.is_empty() {
        return caret_marks();
    }
    Mark::ALL
        .into_iter()
        .filter(|mark| {
            touched
                .iter()
                .all(|key| matches!(doc.get(*key), Some(Node::Text { marks, .. }) if marks.contains(*mark)))
        })
        .collect()
}

/// Plain text under the range. Text from different blocks is joined with
/// newlines.
pub fn selected_text(doc: &Document, selection: &Selection) -> String {
    if selection.is_collapsed() {
        return String::new();
    }
    let (start, end) = selection.ordered(doc);
    let (Some(lo), Some(hi)) = (position(doc, start), position(doc, end)) else {
        return String::new();
    };

    let mut groups: Vec<(NodeKey, String)> = Vec::new();
    for key in doc.descendants(doc.root()) {
        let (content, container) = match doc.get(key) {
            Some(Node::Text { text, .. }) => match inline_container(doc, key) {
                Some(container) => (text, container),
                None => continue,
            },
            Some(Node::CodeBlock { code, .. }) => (code, key),
            _ => continue,
        };
        let Some((before, after)) = span(doc, key) else {
            continue;
        };
        if before >= hi || after <= lo {
            continue;
        }
        let from = if key == start.key { start.offset } else { 0 };
        let to = if key == end.key {
            end.offset
        } else {
            char_len(content)
        };
        let (_, rest) = split_chars(content, from);
        let (piece, _) = split_chars(rest, to.saturating_sub(from));

        match groups.last_mut() {
            Some((last, text)) if *last == container => text.push_str(piece),
            _ => groups.push((container, piece.to_string())),
        }
    }

    groups
        .into_iter()
        .map(|(_, text)| text)
        .collect::<Vec<_>>()
        .join("\n")
}
