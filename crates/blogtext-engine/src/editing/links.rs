use crate::editing::commands::{LinkTarget, Outcome};
use crate::editing::format_state::selected_text;
use crate::editing::marks::insert_text;
use crate::editing::range::{delete_range, inline_container, settle, split_range, touched_texts};
use crate::error::ValidationError;
use crate::models::selection::char_len;
use crate::models::{Document, Node, NodeKey, Point, Selection};

/// Trim and make sure the URL carries an `http://` or `https://` scheme.
pub fn normalize_url(url: &str) -> Result<String, ValidationError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("https://{trimmed}"))
    }
}

pub(crate) fn set_link(
    doc: &mut Document,
    selection: &Selection,
    url: &str,
    label: &str,
    target: LinkTarget,
) -> Result<Outcome, ValidationError> {
    let url = normalize_url(url)?;

    if let LinkTarget::Link(key) = target {
        return Ok(edit_link(doc, selection, key, &url, label));
    }

    let anchor = settle(doc, selection.anchor);
    if matches!(doc.get(anchor.key), Some(Node::CodeBlock { .. })) {
        return Ok(Outcome::Unchanged);
    }

    if selection.is_collapsed() {
        if let Some(link) = doc
            .parent(anchor.key)
            .filter(|p| matches!(doc.get(*p), Some(Node::Link { .. })))
        {
            return Ok(edit_link(doc, selection, link, &url, label));
        }
        let text = if label.is_empty() { url.as_str() } else { label };
        return Ok(insert_and_wrap(doc, selection, text, &url));
    }

    if !label.is_empty() && label != selected_text(doc, selection) {
        let (start, end) = selection.ordered(doc);
        let caret = delete_range(doc, start, end);
        return Ok(insert_and_wrap(doc, &Selection::caret(caret), label, &url));
    }

    let (start, end) = selection.ordered(doc);
    Ok(wrap_range(doc, start, end, &url))
}

/// Rewrite the URL of an existing Link and, when the label differs from its
/// text, collapse its content into a single run holding the label.
fn edit_link(
    doc: &mut Document,
    selection: &Selection,
    key: NodeKey,
    url: &str,
    label: &str,
) -> Outcome {
    let Some(Node::Link { url: current }) = doc.node_mut(key) else {
        log::debug!("set_link: {key} is not a live link");
        return Outcome::Unchanged;
    };
    *current = url.to_string();

    if !label.is_empty() && label != doc.text_content(key) {
        let children = doc.children(key).to_vec();
        let marks = children
            .first()
            .and_then(|first| match doc.get(*first) {
                Some(Node::Text { marks, .. }) => Some(*marks),
                _ => None,
            })
            .unwrap_or_default();
        match children.first() {
            Some(first) => {
                doc.set_node(
                    *first,
                    Node::Text {
                        text: label.to_string(),
                        marks,
                    },
                );
                for rest in &children[1..] {
                    doc.remove(*rest);
                }
            }
            None => {
                doc.insert(
                    key,
                    0,
                    Node::Text {
                        text: label.to_string(),
                        marks,
                    },
                );
            }
        }
    }

    let selection = if selection.is_live(doc) {
        selection.clone()
    } else {
        doc.end_of(key)
            .map(Selection::caret)
            .unwrap_or_else(|| selection.clone())
    };
    Outcome::Mutated(selection)
}

fn insert_and_wrap(doc: &mut Document, selection: &Selection, text: &str, url: &str) -> Outcome {
    let Outcome::Mutated(typed) = insert_text(doc, selection, text) else {
        return Outcome::Unchanged;
    };
    let end = typed.anchor;
    let start = Point::new(end.key, end.offset.saturating_sub(char_len(text)));
    wrap_range(doc, start, end, url)
}

/// Put every run under `[start, end)` inside a Link to `url`.
///
/// Runs are handled per block. Where a block's covered runs already touch a
/// Link, that Link is retargeted and absorbs the rest of the covered runs,
/// so links never nest.
fn wrap_range(doc: &mut Document, start: Point, end: Point, url: &str) -> Outcome {
    let (start, end) = split_range(doc, start, end);
    let covered = touched_texts(doc, start, end);
    if covered.is_empty() {
        return Outcome::Unchanged;
    }

    let mut groups: Vec<(NodeKey, Vec<NodeKey>)> = Vec::new();
    for key in &covered {
        let Some(container) = inline_container(doc, *key) else {
            continue;
        };
        match groups.last_mut() {
            Some((last, runs)) if *last == container => runs.push(*key),
            _ => groups.push((container, vec![*key])),
        }
    }

    for (_, runs) in groups {
        let existing = runs.iter().find_map(|run| {
            doc.parent(*run)
                .filter(|p| matches!(doc.get(*p), Some(Node::Link { .. })))
        });
        match existing {
            Some(link) => absorb_into(doc, link, &runs, url),
            None => {
                let Some((parent, index)) = runs
                    .first()
                    .and_then(|first| doc.parent(*first).zip(doc.index_in_parent(*first)))
                else {
                    continue;
                };
                let link = doc.insert(parent, index, Node::Link { url: url.to_string() });
                for (i, run) in runs.iter().enumerate() {
                    doc.move_node(*run, link, i);
                }
            }
        }
    }

    let first = covered[0];
    let last = covered[covered.len() - 1];
    let last_len = match doc.get(last) {
        Some(Node::Text { text, .. }) => char_len(text),
        _ => 0,
    };
    Outcome::Mutated(Selection::range(
        Point::new(first, 0),
        Point::new(last, last_len),
    ))
}

fn absorb_into(doc: &mut Document, link: NodeKey, runs: &[NodeKey], url: &str) {
    if let Some(Node::Link { url: current }) = doc.node_mut(link) {
        *current = url.to_string();
    }

    let mut leading = 0;
    let mut past_link = false;
    for run in runs {
        let Some(parent) = doc.parent(*run) else {
            continue;
        };
        if parent == link {
            past_link = true;
            continue;
        }
        let at = if past_link {
            doc.children(link).len()
        } else {
            leading += 1;
            leading - 1
        };
        doc.move_node(*run, link, at);
        if matches!(doc.get(parent), Some(Node::Link { .. })) && doc.children(parent).is_empty() {
            doc.remove(parent);
        }
    }
}

/// Unwrap a Link, promoting its runs into the Link's place.
pub(crate) fn remove_link(doc: &mut Document, selection: &Selection, key: NodeKey) -> Outcome {
    if !matches!(doc.get(key), Some(Node::Link { .. })) {
        log::debug!("remove_link: {key} is not a live link");
        return Outcome::Unchanged;
    }
    let Some((parent, index)) = doc.parent(key).zip(doc.index_in_parent(key)) else {
        return Outcome::Unchanged;
    };

    let children = doc.children(key).to_vec();
    for (offset, child) in children.iter().enumerate() {
        doc.move_node(*child, parent, index + offset);
    }
    doc.remove(key);

    let selection = if selection.is_live(doc) {
        selection.clone()
    } else {
        Selection::caret(settle(
            doc,
            Point::new(parent, index + children.len()),
        ))
    };
    Outcome::Mutated(selection)
}
