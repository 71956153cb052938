/*!
 * # Editing Core
 *
 * All changes to a [`Document`](crate::Document) go through the [`Editor`]:
 *
 * - **Commands**: every edit is a [`Cmd`] (also exposed as one method per
 *   command). A command runs against a copy of the document; the copy is
 *   committed whole or dropped, so observers never see a half-applied edit.
 * - **Heading rule**: after every committed command, any heading whose level
 *   is not 2 or 3 is demoted to 2 ([`heading_rule`]).
 * - **Format state**: after every commit or selection change the editor
 *   recomputes a [`FormatState`] from the document and selection alone.
 * - **Failure**: stale node keys are silent no-ops (`Patch::mutated == false`).
 *   Only user input problems (empty URL, empty media source, unsupported media
 *   type) come back as [`ValidationError`](crate::ValidationError), and then
 *   nothing has changed.
 * - **Tickets**: an asynchronous job takes an [`EditTicket`] before it starts and
 *   applies its result with [`Editor::apply_with_ticket`]; if the document was
 *   replaced meanwhile the result is dropped.
 *
 * ```rust
 * use blogtext_engine::{BlockType, Editor, Mark};
 *
 * let mut editor = Editor::default();
 * editor.insert_text("Hello");
 * editor.set_block_type(BlockType::Heading(2));
 * assert_eq!(editor.format_state().heading_level, Some(2));
 * editor.toggle_mark(Mark::Bold);
 * assert!(editor.format_state().bold);
 * ```
 */

pub(crate) mod blocks;
pub mod commands;
pub mod debounce;
pub mod editor;
pub mod format_state;
pub mod heading_rule;
pub mod links;
pub(crate) mod marks;
pub mod media;
pub(crate) mod range;

pub use commands::{BlockType, Cmd, LinkTarget};
pub use debounce::Debouncer;
pub use editor::{EditTicket, Editor, Patch};
pub use format_state::FormatState;
pub use links::normalize_url;
pub use media::MediaKind;
