use crate::editing::commands::{BlockType, Outcome};
use crate::editing::range::touched_blocks;
use crate::models::{Document, LanguagePolicy, ListKind, Node, NodeKey, NodeKind, Selection};

/// Convert the top-level blocks touched by the selection.
///
/// Quote and code conversions toggle: asking for the kind every touched
/// block already has turns them back into paragraphs. Lists are flattened to
/// one block per item. Image and Video blocks are left alone.
pub(crate) fn set_block_type(
    doc: &mut Document,
    selection: &Selection,
    requested: &BlockType,
    policy: &LanguagePolicy,
) -> Outcome {
    let (start, end) = selection.ordered(doc);
    let targets: Vec<NodeKey> = touched_blocks(doc, start, end)
        .into_iter()
        .filter(|b| doc.get(*b).is_some_and(|n| !n.is_media()))
        .collect();
    if targets.is_empty() {
        return Outcome::Unchanged;
    }

    let all = |kind: NodeKind| targets.iter().all(|b| doc.kind(*b) == Some(kind));
    let wanted = match requested {
        BlockType::Quote if all(NodeKind::Quote) => BlockType::Paragraph,
        BlockType::CodeBlock { .. } if all(NodeKind::CodeBlock) => BlockType::Paragraph,
        other => other.clone(),
    };

    let mut produced = Vec::new();
    for block in targets {
        produced.extend(convert(doc, block, &wanted, policy));
    }

    Outcome::Mutated(keep_or_start(doc, selection, produced.first().copied()))
}

/// The selection if it survived the conversion, else a caret at the start of `fallback`.
pub(crate) fn keep_or_start(
    doc: &Document,
    selection: &Selection,
    fallback: Option<NodeKey>,
) -> Selection {
    if selection.is_live(doc) {
        let mut kept = selection.clone();
        kept.pending_marks = None;
        return kept;
    }
    match fallback.and_then(|key| doc.start_of(key)) {
        Some(point) => Selection::caret(point),
        None => selection.clone(),
    }
}

fn inline_node(wanted: &BlockType) -> Option<Node> {
    match wanted {
        BlockType::Paragraph => Some(Node::Paragraph),
        BlockType::Heading(level) => Some(Node::Heading { level: *level }),
        BlockType::Quote => Some(Node::Quote),
        BlockType::CodeBlock { .. } => None,
    }
}

fn convert(
    doc: &mut Document,
    block: NodeKey,
    wanted: &BlockType,
    policy: &LanguagePolicy,
) -> Vec<NodeKey> {
    let Some(node) = doc.get(block).cloned() else {
        return Vec::new();
    };
    let Some(index) = doc.index_in_parent(block) else {
        return Vec::new();
    };
    let root = doc.root();

    match (node, wanted) {
        (Node::CodeBlock { .. }, BlockType::CodeBlock { language }) => {
            let language = policy.resolve(language.as_deref());
            if let Some(Node::CodeBlock { language: current, .. }) = doc.node_mut(block) {
                *current = language;
            }
            vec![block]
        }
        (Node::CodeBlock { code, .. }, wanted) => {
            let Some(replacement) = inline_node(wanted) else {
                return vec![block];
            };
            let key = doc.insert(root, index, replacement);
            if !code.is_empty() {
                doc.insert(
                    key,
                    0,
                    Node::Text {
                        text: code,
                        marks: Default::default(),
                    },
                );
            }
            doc.remove(block);
            vec![key]
        }
        (Node::List { .. }, wanted) => {
            let items = flatten_items(doc, block);
            let mut produced = Vec::with_capacity(items.len());
            for (offset, item) in items.into_iter().enumerate() {
                let at = index + offset;
                let key = match inline_node(wanted) {
                    Some(replacement) => {
                        let key = doc.insert(root, at, replacement);
                        move_inlines(doc, item, key);
                        key
                    }
                    None => {
                        let code = inline_text_of(doc, item);
                        doc.insert(
                            root,
                            at,
                            Node::CodeBlock {
                                language: code_language(wanted, policy),
                                code,
                            },
                        )
                    }
                };
                produced.push(key);
            }
            doc.remove(block);
            produced
        }
        (node, wanted) if node.holds_inlines() => match inline_node(wanted) {
            Some(replacement) => {
                doc.set_node(block, replacement);
                vec![block]
            }
            None => {
                let code = doc.text_content(block);
                doc.remove(block);
                vec![doc.insert(
                    root,
                    index,
                    Node::CodeBlock {
                        language: code_language(wanted, policy),
                        code,
                    },
                )]
            }
        },
        _ => vec![block],
    }
}

fn code_language(wanted: &BlockType, policy: &LanguagePolicy) -> String {
    match wanted {
        BlockType::CodeBlock { language } => policy.resolve(language.as_deref()),
        _ => policy.default_language().to_string(),
    }
}

/// Items of `list` and of every list nested in it, in reading order.
fn flatten_items(doc: &Document, list: NodeKey) -> Vec<NodeKey> {
    let mut out = Vec::new();
    for item in doc.children(list) {
        out.push(*item);
        for child in doc.children(*item) {
            if matches!(doc.get(*child), Some(Node::List { .. })) {
                out.extend(flatten_items(doc, *child));
            }
        }
    }
    out
}

/// Move the inline children of `from` to the end of `to`, keeping their keys.
fn move_inlines(doc: &mut Document, from: NodeKey, to: NodeKey) {
    let inlines: Vec<NodeKey> = doc
        .children(from)
        .iter()
        .copied()
        .filter(|k| doc.get(*k).is_some_and(Node::is_inline))
        .collect();
    for key in inlines {
        let at = doc.children(to).len();
        doc.move_node(key, to, at);
    }
}

fn inline_text_of(doc: &Document, item: NodeKey) -> String {
    doc.children(item)
        .iter()
        .filter(|k| doc.get(**k).is_some_and(Node::is_inline))
        .map(|k| doc.text_content(*k))
        .collect()
}

/// Wrap the touched blocks in a list of `kind`, retype a touched list, or
/// with `None` unwrap touched lists into paragraphs.
pub(crate) fn set_list_type(
    doc: &mut Document,
    selection: &Selection,
    kind: Option<ListKind>,
) -> Outcome {
    let (start, end) = selection.ordered(doc);
    let targets = touched_blocks(doc, start, end);
    if targets.is_empty() {
        return Outcome::Unchanged;
    }

    let Some(kind) = kind else {
        let lists: Vec<NodeKey> = targets
            .into_iter()
            .filter(|b| matches!(doc.get(*b), Some(Node::List { .. })))
            .collect();
        if lists.is_empty() {
            return Outcome::Unchanged;
        }
        let mut produced = Vec::new();
        for list in lists {
            produced.extend(convert(doc, list, &BlockType::Paragraph, &LanguagePolicy::default()));
        }
        return Outcome::Mutated(keep_or_start(doc, selection, produced.first().copied()));
    };

    let all_lists = targets
        .iter()
        .all(|b| matches!(doc.get(*b), Some(Node::List { .. })));
    if all_lists {
        let mut retyped = false;
        for list in &targets {
            if let Some(Node::List { kind: current }) = doc.node_mut(*list)
                && *current != kind
            {
                *current = kind;
                retyped = true;
            }
        }
        if !retyped {
            return Outcome::Unchanged;
        }
        return Outcome::Mutated(keep_or_start(doc, selection, targets.first().copied()));
    }

    let root = doc.root();
    let mut open: Option<NodeKey> = None;
    let mut first_list = None;
    for block in targets {
        let Some(node) = doc.get(block).cloned() else {
            continue;
        };
        if node.is_media() {
            open = None;
            continue;
        }
        let list = match open {
            Some(list) => list,
            None => {
                let index = doc.index_in_parent(block).unwrap_or(doc.blocks().len());
                let list = doc.insert(root, index, Node::List { kind });
                first_list.get_or_insert(list);
                open = Some(list);
                list
            }
        };
        match node {
            Node::List { .. } => {
                let items: Vec<NodeKey> = doc.children(block).to_vec();
                for item in items {
                    let at = doc.children(list).len();
                    doc.move_node(item, list, at);
                }
            }
            Node::CodeBlock { code, .. } => {
                let item = doc.insert(list, doc.children(list).len(), Node::ListItem);
                if !code.is_empty() {
                    doc.insert(
                        item,
                        0,
                        Node::Text {
                            text: code,
                            marks: Default::default(),
                        },
                    );
                }
            }
            _ => {
                let item = doc.insert(list, doc.children(list).len(), Node::ListItem);
                move_inlines(doc, block, item);
            }
        }
        doc.remove(block);
    }

    Outcome::Mutated(keep_or_start(doc, selection, first_list))
}

/// Point a live CodeBlock at a language from the allow-list.
pub(crate) fn set_code_language(
    doc: &mut Document,
    selection: &Selection,
    key: NodeKey,
    language: &str,
    policy: &LanguagePolicy,
) -> Outcome {
    let resolved = policy.resolve(Some(language));
    match doc.node_mut(key) {
        Some(Node::CodeBlock { language: current, .. }) => {
            if *current == resolved {
                return Outcome::Unchanged;
            }
            *current = resolved;
            Outcome::Mutated(selection.clone())
        }
        _ => {
            log::debug!("set_code_language: {key} is not a live code block");
            Outcome::Unchanged
        }
    }
}

/// Re-resolve every code block language through `policy`, in place.
/// Returns how many blocks changed.
pub(crate) fn normalize_code_languages(doc: &mut Document, policy: &LanguagePolicy) -> usize {
    let code_blocks: Vec<NodeKey> = doc
        .descendants(doc.root())
        .into_iter()
        .filter(|key| matches!(doc.get(*key), Some(Node::CodeBlock { .. })))
        .collect();

    let mut changed = 0;
    for key in code_blocks {
        if let Some(Node::CodeBlock { language, .. }) = doc.node_mut(key) {
            let resolved = policy.resolve(Some(language.as_str()));
            if *language != resolved {
                log::debug!("code block {key}: language {language:?} becomes {resolved:?}");
                *language = resolved;
                changed += 1;
            }
        }
    }
    changed
}
