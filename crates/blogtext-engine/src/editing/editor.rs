use crate::editing::commands::{BlockType, Cmd, LinkTarget, Outcome};
use crate::editing::format_state::{self, FormatState};
use crate::editing::media::MediaKind;
use crate::editing::{blocks, heading_rule, links, marks, media};
use crate::error::ValidationError;
use crate::models::{
    Document, DocumentId, LanguagePolicy, ListKind, Mark, Node, NodeKey, Point, Selection,
};

/// Result of applying a command
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub version: u64,
    /// Whether the document changed. A selection-only change leaves this false.
    pub mutated: bool,
    pub selection: Selection,
}

/// Identity of the document an asynchronous job started against.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EditTicket {
    document: DocumentId,
}

/// Owns the document, the selection and the toolbar state derived from them.
///
/// Every command runs against a copy of the document. Only a finished copy
/// is committed, after the heading rule and the code language policy have run
/// over it, so no half-applied state is ever visible.
#[derive(Debug, Clone)]
pub struct Editor {
    doc: Document,
    selection: Selection,
    policy: LanguagePolicy,
    version: u64,
    state: FormatState,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(LanguagePolicy::default())
    }
}

impl Editor {
    pub fn new(policy: LanguagePolicy) -> Self {
        Self::with_document(Document::new(), policy)
    }

    pub fn with_document(mut doc: Document, policy: LanguagePolicy) -> Self {
        enforce_rules(&mut doc, &policy);
        let selection = Selection::caret(initial_point(&doc));
        let state = format_state::resolve(&doc, &selection, &policy);
        Self {
            doc,
            selection,
            policy,
            version: 0,
            state,
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn policy(&self) -> &LanguagePolicy {
        &self.policy
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn format_state(&self) -> &FormatState {
        &self.state
    }

    pub fn ticket(&self) -> EditTicket {
        EditTicket {
            document: self.doc.id(),
        }
    }

    /// Swap in a freshly hydrated document. Tickets taken before this call
    /// stop working.
    pub fn replace_document(&mut self, mut doc: Document) {
        enforce_rules(&mut doc, &self.policy);
        self.selection = Selection::caret(initial_point(&doc));
        self.doc = doc;
        self.version += 1;
        self.refresh();
    }

    /// Move the selection. Points naming an Image or Video are moved to the
    /// boundary before (offset 0) or after the leaf. Returns false, leaving
    /// the selection alone, when a point does not resolve.
    pub fn set_selection(&mut self, selection: Selection) -> bool {
        let selection = Selection {
            anchor: self.outside_media(selection.anchor),
            focus: self.outside_media(selection.focus),
            pending_marks: selection.pending_marks,
        };
        if !selection.is_live(&self.doc) {
            log::debug!("ignoring selection that does not resolve: {selection:?}");
            return false;
        }
        self.selection = selection;
        self.refresh();
        true
    }

    fn outside_media(&self, point: Point) -> Point {
        match self.doc.get(point.key) {
            Some(node) if node.is_media() => {
                let bound = if point.offset == 0 {
                    self.doc.start_of(point.key)
                } else {
                    self.doc.end_of(point.key)
                };
                bound.unwrap_or(point)
            }
            _ => point,
        }
    }

    pub fn apply(&mut self, cmd: Cmd) -> Result<Patch, ValidationError> {
        let mut draft = self.doc.clone();
        let selection = &self.selection;
        let outcome = match &cmd {
            Cmd::ToggleMark { mark } => marks::toggle_mark(&mut draft, selection, *mark),
            Cmd::SetBlockType { block } => {
                blocks::set_block_type(&mut draft, selection, block, &self.policy)
            }
            Cmd::SetListType { kind } => blocks::set_list_type(&mut draft, selection, *kind),
            Cmd::SetLink { url, label, target } => {
                links::set_link(&mut draft, selection, url, label, *target)
                    .inspect_err(|e| log::warn!("set_link rejected: {e}"))?
            }
            Cmd::RemoveLink { key } => links::remove_link(&mut draft, selection, *key),
            Cmd::InsertImage { src, alt } => {
                let src = required_source(src)?;
                let leaf = Node::Image {
                    src,
                    alt: alt.clone(),
                };
                media::insert_leaf(&mut draft, selection, leaf)
            }
            Cmd::InsertVideo { src } => {
                let src = required_source(src)?;
                media::insert_leaf(&mut draft, selection, Node::Video { src })
            }
            Cmd::SetCodeLanguage { key, language } => {
                blocks::set_code_language(&mut draft, selection, *key, language, &self.policy)
            }
            Cmd::InsertText { text } => marks::insert_text(&mut draft, selection, text),
        };
        Ok(self.commit(draft, outcome))
    }

    /// Apply `cmd` only if the document is still the one `ticket` was taken
    /// from. A job that outlived its document gets an unchanged patch.
    pub fn apply_with_ticket(
        &mut self,
        ticket: EditTicket,
        cmd: Cmd,
    ) -> Result<Patch, ValidationError> {
        if ticket != self.ticket() {
            log::debug!("dropping {cmd:?}: document was replaced");
            return Ok(self.unchanged());
        }
        self.apply(cmd)
    }

    fn commit(&mut self, mut draft: Document, outcome: Outcome) -> Patch {
        match outcome {
            Outcome::Unchanged => self.unchanged(),
            Outcome::Selection(selection) => {
                self.selection = selection;
                self.refresh();
                self.unchanged()
            }
            Outcome::Mutated(selection) => {
                enforce_rules(&mut draft, &self.policy);
                let selection = if selection.is_live(&draft) {
                    selection
                } else {
                    Selection::caret(initial_point(&draft))
                };
                self.doc = draft;
                self.selection = selection;
                self.version += 1;
                self.refresh();
                log::trace!("committed version {}", self.version);
                Patch {
                    version: self.version,
                    mutated: true,
                    selection: self.selection.clone(),
                }
            }
        }
    }

    fn unchanged(&self) -> Patch {
        Patch {
            version: self.version,
            mutated: false,
            selection: self.selection.clone(),
        }
    }

    fn refresh(&mut self) {
        self.state = format_state::resolve(&self.doc, &self.selection, &self.policy);
    }

    // --- one method per command ---

    pub fn toggle_mark(&mut self, mark: Mark) -> Patch {
        self.apply_infallible(Cmd::ToggleMark { mark })
    }

    pub fn set_block_type(&mut self, block: BlockType) -> Patch {
        self.apply_infallible(Cmd::SetBlockType { block })
    }

    pub fn set_list_type(&mut self, kind: Option<ListKind>) -> Patch {
        self.apply_infallible(Cmd::SetListType { kind })
    }

    pub fn set_link(
        &mut self,
        url: &str,
        label: &str,
        target: LinkTarget,
    ) -> Result<Patch, ValidationError> {
        self.apply(Cmd::SetLink {
            url: url.to_string(),
            label: label.to_string(),
            target,
        })
    }

    pub fn remove_link(&mut self, key: NodeKey) -> Patch {
        self.apply_infallible(Cmd::RemoveLink { key })
    }

    pub fn insert_image(&mut self, src: &str, alt: &str) -> Result<Patch, ValidationError> {
        self.apply(Cmd::InsertImage {
            src: src.to_string(),
            alt: alt.to_string(),
        })
    }

    pub fn insert_video(&mut self, src: &str) -> Result<Patch, ValidationError> {
        self.apply(Cmd::InsertVideo {
            src: src.to_string(),
        })
    }

    /// Insert an uploaded file once its URL is known, checking its MIME type.
    pub fn insert_media(&mut self, mime: &str, url: &str) -> Result<Patch, ValidationError> {
        match MediaKind::from_mime(mime)? {
            MediaKind::Image => self.insert_image(url, ""),
            MediaKind::Video => self.insert_video(url),
        }
    }

    pub fn set_code_language(&mut self, key: NodeKey, language: &str) -> Patch {
        self.apply_infallible(Cmd::SetCodeLanguage {
            key,
            language: language.to_string(),
        })
    }

    pub fn insert_text(&mut self, text: &str) -> Patch {
        self.apply_infallible(Cmd::InsertText {
            text: text.to_string(),
        })
    }

    fn apply_infallible(&mut self, cmd: Cmd) -> Patch {
        self.apply(cmd).unwrap_or_else(|_| self.unchanged())
    }
}

/// Rules every document the editor holds satisfies.
fn enforce_rules(doc: &mut Document, policy: &LanguagePolicy) {
    heading_rule::enforce(doc);
    blocks::normalize_code_languages(doc, policy);
}

fn required_source(src: &str) -> Result<String, ValidationError> {
    let src = src.trim();
    if src.is_empty() {
        log::warn!("media insert rejected: empty source");
        return Err(ValidationError::EmptySource);
    }
    Ok(src.to_string())
}

fn initial_point(doc: &Document) -> Point {
    doc.blocks()
        .first()
        .and_then(|first| doc.start_of(*first))
        .unwrap_or(Point::new(doc.root(), 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Block, Inline, NodeKind};
    use pretty_assertions::assert_eq;

    fn editor(blocks: &[Block]) -> Editor {
        Editor::with_document(Document::from_blocks(blocks), LanguagePolicy::default())
    }

    #[test]
    fn commits_bump_version_and_refresh_state() {
        let mut editor = editor(&[Block::paragraph(vec![Inline::text("Title")])]);
        assert_eq!(editor.version(), 0);
        assert_eq!(editor.format_state().block_kind, Some(NodeKind::Paragraph));

        let patch = editor.set_block_type(BlockType::Heading(2));
        assert!(patch.mutated);
        assert_eq!(patch.version, 1);
        assert_eq!(editor.format_state().heading_level, Some(2));
    }

    #[test]
    fn heading_rule_runs_after_every_command() {
        let mut editor = editor(&[Block::paragraph(vec![Inline::text("Title")])]);
        editor.set_block_type(BlockType::Heading(5));
        assert_eq!(
            editor.document().to_blocks(),
            vec![Block::heading(2, vec![Inline::text("Title")])]
        );
        assert_eq!(editor.format_state().heading_level, Some(2));
    }

    #[test]
    fn loaded_code_languages_follow_the_policy() {
        let mut editor = editor(&[Block::code("rust", "fn x() {}")]);
        assert_eq!(
            editor.document().to_blocks(),
            vec![Block::code("javascript", "fn x() {}")]
        );
        assert_eq!(editor.format_state().code_language, "javascript");

        editor.replace_document(Document::from_blocks(&[Block::code("", "")]));
        assert_eq!(
            editor.document().to_blocks(),
            vec![Block::code("javascript", "")]
        );
    }

    #[test]
    fn validation_errors_leave_everything_untouched() {
        let mut editor = editor(&[Block::paragraph(vec![Inline::text("x")])]);
        let before = editor.document().to_blocks();

        assert_eq!(
            editor.set_link("", "label", LinkTarget::Selection),
            Err(ValidationError::EmptyUrl)
        );
        assert_eq!(
            editor.insert_image("  ", "alt"),
            Err(ValidationError::EmptySource)
        );
        assert_eq!(
            editor.insert_media("text/plain", "https://x/file.txt"),
            Err(ValidationError::UnsupportedMediaType("text/plain".to_string()))
        );
        assert_eq!(editor.document().to_blocks(), before);
        assert_eq!(editor.version(), 0);
    }

    #[test]
    fn stale_ticket_is_a_no_op() {
        let mut editor = editor(&[Block::paragraph(vec![Inline::text("x")])]);
        let ticket = editor.ticket();
        editor.replace_document(Document::from_blocks(&[Block::paragraph(vec![
            Inline::text("fresh"),
        ])]));

        let patch = editor
            .apply_with_ticket(
                ticket,
                Cmd::InsertImage {
                    src: "https://x/late.png".to_string(),
                    alt: String::new(),
                },
            )
            .unwrap();
        assert!(!patch.mutated);
        assert_eq!(editor.document().blocks().len(), 1);

        let fresh = editor.ticket();
        let patch = editor
            .apply_with_ticket(
                fresh,
                Cmd::InsertVideo {
                    src: "https://x/v.mp4".to_string(),
                },
            )
            .unwrap();
        assert!(patch.mutated);
    }

    #[test]
    fn selection_on_media_moves_to_its_boundary() {
        let mut editor = editor(&[
            Block::paragraph(vec![Inline::text("a")]),
            Block::video("https://x/v.mp4"),
        ]);
        let video = editor.document().blocks()[1];
        let root = editor.document().root();

        assert!(editor.set_selection(Selection::caret(Point::new(video, 1))));
        assert_eq!(editor.selection().anchor, Point::new(root, 2));
        assert_eq!(editor.format_state().block_kind, None);

        let foreign = Document::new().root();
        assert!(!editor.set_selection(Selection::caret(Point::new(foreign, 0))));
        assert_eq!(editor.selection().anchor, Point::new(root, 2));
    }

    #[test]
    fn stale_keys_never_error() {
        let mut editor = editor(&[Block::code("go", "x")]);
        let code = editor.document().blocks()[0];
        editor.set_block_type(BlockType::Paragraph);
        assert!(!editor.document().contains(code));

        let patch = editor.set_code_language(code, "python");
        assert!(!patch.mutated);
        let patch = editor.remove_link(code);
        assert!(!patch.mutated);
    }
}
