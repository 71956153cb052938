use anyhow::{Context, Result, bail};
use blogtext_config::{Config, PersistenceFormat};
use blogtext_engine::models::selection::char_len;
use blogtext_engine::{
    Document, Editor, FormatState, LanguagePolicy, Node, NodeKey, Point, Selection, from_html,
    from_markdown, table_of_contents, to_html, to_markdown,
};
use std::path::{Path, PathBuf};
use std::{env, process};

const USAGE: &str = "\
Usage:
  blogtext convert <input> [--to markdown|html]
  blogtext toc <input>
  blogtext state <input> <block-index> <offset>";

#[derive(Debug, PartialEq)]
enum Command {
    /// Re-serialize a post, by default into the configured storage format
    Convert {
        input: PathBuf,
        to: Option<PersistenceFormat>,
    },
    Toc {
        input: PathBuf,
    },
    /// Toolbar state for a caret in a top-level block
    State {
        input: PathBuf,
        block: usize,
        offset: usize,
    },
}

fn parse_args(args: &[String]) -> Result<Command> {
    let Some((name, rest)) = args.split_first() else {
        bail!("missing command");
    };

    match (name.as_str(), rest) {
        ("convert", [input]) => Ok(Command::Convert {
            input: PathBuf::from(input),
            to: None,
        }),
        ("convert", [input, flag, format]) if flag == "--to" => Ok(Command::Convert {
            input: PathBuf::from(input),
            to: Some(parse_format(format)?),
        }),
        ("toc", [input]) => Ok(Command::Toc {
            input: PathBuf::from(input),
        }),
        ("state", [input, block, offset]) => Ok(Command::State {
            input: PathBuf::from(input),
            block: block
                .parse()
                .with_context(|| format!("invalid block index '{block}'"))?,
            offset: offset
                .parse()
                .with_context(|| format!("invalid offset '{offset}'"))?,
        }),
        _ => bail!("unrecognized arguments: {}", args.join(" ")),
    }
}

fn parse_format(format: &str) -> Result<PersistenceFormat> {
    match format {
        "markdown" | "md" => Ok(PersistenceFormat::Markdown),
        "html" => Ok(PersistenceFormat::Html),
        other => bail!("unknown format '{other}' (expected markdown or html)"),
    }
}

/// Relative inputs that do not exist here are looked up in the posts folder.
fn resolve_input(input: &Path, config: &Config) -> PathBuf {
    if input.is_relative()
        && !input.exists()
        && let Some(posts_path) = &config.posts_path
    {
        let candidate = posts_path.join(input);
        if candidate.exists() {
            return candidate;
        }
    }
    input.to_path_buf()
}

fn load_document(input: &Path, config: &Config, policy: &LanguagePolicy) -> Result<Document> {
    let path = resolve_input(input, config);
    let format = PersistenceFormat::from_path(&path).with_context(|| {
        format!(
            "cannot tell the format of '{}' (use .md, .markdown, .html or .htm)",
            path.display()
        )
    })?;
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    log::info!("loaded {} as {format:?}", path.display());

    Ok(match format {
        PersistenceFormat::Markdown => from_markdown(&content, policy),
        PersistenceFormat::Html => from_html(&content, policy),
    })
}

fn run(command: &Command, config: &Config) -> Result<String> {
    let policy = config
        .language_policy()
        .context("invalid [code] section in config")?;

    match command {
        Command::Convert { input, to } => {
            let doc = load_document(input, config, &policy)?;
            Ok(match to.unwrap_or(config.format) {
                PersistenceFormat::Markdown => to_markdown(&doc),
                PersistenceFormat::Html => to_html(&doc) + "\n",
            })
        }
        Command::Toc { input } => {
            let doc = load_document(input, config, &policy)?;
            let mut out = String::new();
            for entry in table_of_contents(&doc) {
                let indent = "  ".repeat(usize::from(entry.level.saturating_sub(2)));
                out.push_str(&format!("{indent}- {} (#{})\n", entry.title, entry.id));
            }
            Ok(out)
        }
        Command::State {
            input,
            block,
            offset,
        } => {
            let doc = load_document(input, config, &policy)?;
            let key = *doc
                .blocks()
                .get(*block)
                .with_context(|| format!("no block {block}, document has {}", doc.blocks().len()))?;
            let point = point_in_block(&doc, key, *offset)
                .with_context(|| format!("offset {offset} is outside block {block}"))?;

            let mut editor = Editor::with_document(doc, policy);
            if !editor.set_selection(Selection::caret(point)) {
                bail!("cannot place a caret at offset {offset} of block {block}");
            }
            Ok(describe_state(editor.format_state()))
        }
    }
}

/// Map a character offset within a block's text onto a caret point.
fn point_in_block(doc: &Document, block: NodeKey, offset: usize) -> Option<Point> {
    match doc.get(block)? {
        Node::CodeBlock { code, .. } => (offset <= char_len(code)).then(|| Point::new(block, offset)),
        Node::Image { .. } | Node::Video { .. } => doc.start_of(block),
        _ => {
            let mut remaining = offset;
            for key in doc.descendants(block) {
                if let Some(Node::Text { text, .. }) = doc.get(key) {
                    let len = char_len(text);
                    if remaining <= len {
                        return Some(Point::new(key, remaining));
                    }
                    remaining -= len;
                }
            }
            // Empty blocks only take a caret at their start.
            (offset == 0).then(|| doc.start_of(block)).flatten()
        }
    }
}

fn describe_state(state: &FormatState) -> String {
    let mut lines = vec![
        format!("bold: {}", state.bold),
        format!("italic: {}", state.italic),
        format!("code: {}", state.code),
    ];
    if let Some(kind) = state.block_kind {
        lines.push(format!("block: {kind:?}"));
    }
    if let Some(level) = state.heading_level {
        lines.push(format!("heading: h{level}"));
    }
    if let Some(kind) = state.list_kind {
        lines.push(format!("list: {kind:?}"));
    }
    if state.code_block_key.is_some() {
        lines.push(format!("language: {}", state.code_language));
    }
    if let Some(url) = &state.link_url {
        lines.push(format!("link: {url}"));
    }
    lines.join("\n") + "\n"
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("{USAGE}");
            process::exit(2);
        }
    };

    let config = match Config::load() {
        Ok(Some(config)) => config,
        Ok(None) => {
            log::debug!(
                "no config at {}, using defaults",
                Config::config_path().display()
            );
            Config::default()
        }
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            process::exit(1);
        }
    };

    print!("{}", run(&command, &config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_args() {
        assert_eq!(
            parse_args(&args(&["convert", "post.md", "--to", "html"])).unwrap(),
            Command::Convert {
                input: PathBuf::from("post.md"),
                to: Some(PersistenceFormat::Html),
            }
        );
        assert_eq!(
            parse_args(&args(&["state", "post.html", "2", "5"])).unwrap(),
            Command::State {
                input: PathBuf::from("post.html"),
                block: 2,
                offset: 5,
            }
        );
        assert!(parse_args(&args(&["convert", "post.md", "--to", "rtf"])).is_err());
        assert!(parse_args(&args(&["state", "post.md", "x", "0"])).is_err());
        assert!(parse_args(&args(&[])).is_err());
    }

    #[test]
    fn test_convert_markdown_to_html() {
        let dir = TempDir::new().unwrap();
        let input = write(&dir, "post.md", "# Hello\n\nSome **bold** text.\n");

        let output = run(
            &Command::Convert {
                input,
                to: Some(PersistenceFormat::Html),
            },
            &Config::default(),
        )
        .unwrap();

        assert_eq!(
            output,
            "<h2>Hello</h2><p>Some <strong>bold</strong> text.</p>\n"
        );
    }

    #[test]
    fn test_convert_uses_configured_format() {
        let dir = TempDir::new().unwrap();
        let input = write(&dir, "post.html", "<h4>Hi</h4><ul><li>one</li></ul>");

        let output = run(&Command::Convert { input, to: None }, &Config::default()).unwrap();

        assert_eq!(output, "## Hi\n\n- one\n");
    }

    #[test]
    fn test_toc_lists_headings() {
        let dir = TempDir::new().unwrap();
        let input = write(&dir, "post.md", "## Intro\n\ntext\n\n### Details\n\n## Intro\n");

        let output = run(&Command::Toc { input }, &Config::default()).unwrap();

        assert_eq!(
            output,
            "- Intro (#intro)\n  - Details (#details)\n- Intro (#intro-1)\n"
        );
    }

    #[test]
    fn test_state_reports_marks_and_block() {
        let dir = TempDir::new().unwrap();
        let input = write(&dir, "post.md", "### Title\n\nplain **bold**\n");

        let output = run(
            &Command::State {
                input,
                block: 1,
                offset: 8,
            },
            &Config::default(),
        )
        .unwrap();

        assert_eq!(output, "bold: true\nitalic: false\ncode: false\nblock: Paragraph\n");
    }

    #[test]
    fn test_relative_input_found_in_posts_path() {
        let dir = TempDir::new().unwrap();
        write(&dir, "blogtext-cli-only-here.md", "## Found\n");
        let config = Config {
            posts_path: Some(dir.path().to_path_buf()),
            ..Config::default()
        };

        let output = run(
            &Command::Toc {
                input: PathBuf::from("blogtext-cli-only-here.md"),
            },
            &config,
        )
        .unwrap();

        assert_eq!(output, "- Found (#found)\n");
    }

    #[test]
    fn test_missing_relative_input_keeps_its_own_path() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            posts_path: Some(dir.path().to_path_buf()),
            ..Config::default()
        };

        let err = run(
            &Command::Toc {
                input: PathBuf::from("blogtext-cli-missing.md"),
            },
            &config,
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "failed to read 'blogtext-cli-missing.md'");
    }

    #[test]
    fn test_unknown_extension_is_an_error() {
        let dir = TempDir::new().unwrap();
        let input = write(&dir, "post.txt", "hello");

        let err = run(&Command::Toc { input }, &Config::default()).unwrap_err();

        assert!(err.to_string().contains("cannot tell the format"));
    }
}
