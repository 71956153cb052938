//! Line-level Markdown extensions for the two media leaves.
//!
//! Standard Markdown has no video element and only an inline image, so both
//! leaves get a whole-line syntax of their own:
//!
//! ```markdown
//! ![alt text](https://cdn.example.com/cat.png)
//! <VideoPlayer src="https://cdn.example.com/clip.mp4" />
//! ```
//!
//! The importer tries these matchers on every unindented line outside fenced
//! code before handing the rest to the CommonMark parser.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::Block;

static IMAGE_LINE: OnceLock<Regex> = OnceLock::new();
static VIDEO_LINE: OnceLock<Regex> = OnceLock::new();

fn image_line() -> &'static Regex {
    IMAGE_LINE.get_or_init(|| {
        Regex::new(r"^!\[((?:\\.|[^\\\]])*)\]\((?:<((?:\\.|[^\\<>])*)>|([^)]+))\)\s*$")
            .expect("Invalid image line regex")
    })
}

fn video_line() -> &'static Regex {
    VIDEO_LINE.get_or_init(|| {
        Regex::new(r#"^<VideoPlayer\s+src="([^"]+)"[^>]*/?>\s*$"#)
            .expect("Invalid video line regex")
    })
}

/// Recognize a line that is exactly one image or one video.
pub fn match_media_line(line: &str) -> Option<Block> {
    if let Some(caps) = image_line().captures(line) {
        let alt = unescape(caps.get(1).map_or("", |m| m.as_str()));
        let src = unescape(
            caps.get(2)
                .or_else(|| caps.get(3))
                .map_or("", |m| m.as_str())
                .trim(),
        );
        if src.is_empty() {
            return None;
        }
        return Some(Block::image(src, alt));
    }

    let caps = video_line().captures(line)?;
    let src = html_escape::decode_html_entities(&caps[1]).trim().to_string();
    if src.is_empty() {
        return None;
    }
    Some(Block::video(src))
}

pub fn image_to_markdown(src: &str, alt: &str) -> String {
    let mut label = String::with_capacity(alt.len());
    for c in alt.chars() {
        match c {
            '\\' | '[' | ']' => {
                label.push('\\');
                label.push(c);
            }
            '\n' => label.push(' '),
            _ => label.push(c),
        }
    }
    format!("![{label}]({})", destination(src))
}

pub fn video_to_markdown(src: &str) -> String {
    format!(
        "<VideoPlayer src=\"{}\" />",
        html_escape::encode_double_quoted_attribute(src)
    )
}

/// Link or image destination, wrapped in `<>` when the bare form would not
/// survive a re-parse. Inside the brackets `\`, `<` and `>` are
/// backslash-escaped.
pub(crate) fn destination(url: &str) -> String {
    let needs_brackets = url.is_empty()
        || url
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '<' | '>' | '\\'));
    if !needs_brackets {
        return url.to_string();
    }
    let mut out = String::with_capacity(url.len() + 2);
    out.push('<');
    for c in url.chars() {
        if matches!(c, '\\' | '<' | '>') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('>');
    out
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next) if next.is_ascii_punctuation() => out.push(next),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}
