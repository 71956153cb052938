//! Table of contents for a post, built from its H2/H3 headings.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{Block, Document, inline_text};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    /// Anchor id, unique within the document
    pub id: String,
    pub title: String,
    pub level: u8,
}

/// H2 and H3 headings in document order with GitHub-style slug ids.
pub fn table_of_contents(doc: &Document) -> Vec<TocEntry> {
    let mut slugger = Slugger::default();
    doc.to_blocks()
        .into_iter()
        .filter_map(|block| match block {
            Block::Heading { level, content } if (2..=3).contains(&level) => {
                let title = inline_text(&content).replace('\n', " ").trim().to_string();
                Some(TocEntry {
                    id: slugger.slug(&title),
                    title,
                    level,
                })
            }
            _ => None,
        })
        .collect()
}

/// Hands out slugs, suffixing repeats with `-1`, `-2`, ...
#[derive(Debug, Default)]
pub struct Slugger {
    seen: HashMap<String, usize>,
}

impl Slugger {
    pub fn slug(&mut self, title: &str) -> String {
        let base = slugify(title);
        let mut slug = base.clone();
        while let Some(count) = self.seen.get_mut(&slug) {
            *count += 1;
            slug = format!("{base}-{count}");
        }
        self.seen.insert(slug.clone(), 0);
        slug
    }
}

/// Lower-case, drop punctuation, and turn each space into `-`.
pub fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | ' '))
        .map(|c| if c == ' ' { '-' } else { c })
        .collect()
}
