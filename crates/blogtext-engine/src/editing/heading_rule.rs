use crate::models::{Block, Document, Node};

/// Heading levels the authoring surface exposes.
pub const ALLOWED_HEADING_LEVELS: [u8; 2] = [2, 3];

/// Level a heading of `level` ends up with once the rule has run.
pub fn restrict_level(level: u8) -> u8 {
    if ALLOWED_HEADING_LEVELS.contains(&level) {
        level
    } else {
        ALLOWED_HEADING_LEVELS[0]
    }
}

/// Demote every out-of-range heading in `doc` to level 2, in place.
/// Keys and inline content are untouched. Returns how many headings changed.
pub fn enforce(doc: &mut Document) -> usize {
    let offenders: Vec<_> = doc
        .descendants(doc.root())
        .into_iter()
        .filter(|key| {
            matches!(doc.get(*key), Some(Node::Heading { level }) if restrict_level(*level) != *level)
        })
        .collect();

    for key in &offenders {
        if let Some(Node::Heading { level }) = doc.node_mut(*key) {
            log::debug!("demoting heading {key} from level {level}");
            *level = restrict_level(*level);
        }
    }
    offenders.len()
}

/// Same rule over a key-free block sequence, as produced by the deserializers.
pub fn enforce_blocks(blocks: &mut [Block]) -> usize {
    let mut changed = 0;
    for block in blocks {
        if let Block::Heading { level, .. } = block {
            let restricted = restrict_level(*level);
            if restricted != *level {
                *level = restricted;
                changed += 1;
            }
        }
    }
    changed
}
