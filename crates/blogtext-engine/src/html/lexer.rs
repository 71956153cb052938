//! # HTML Tokenizer
//!
//! Splits persisted HTML into tags and text with [Logos]. Like the rest of
//! the HTML path this is forgiving: every byte lands in exactly one token, and
//! a `<` that does not start a well-formed tag is its own [`TokenKind::Lt`]
//! token which later stages treat as text.
//!
//! [Logos]: https://docs.rs/logos
//!
//! ```
//! use blogtext_engine::html::lexer::{lex, TokenKind};
//!
//! let tokens = lex("<p class=\"x\">a &lt; b</p>");
//! let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
//! assert_eq!(kinds, [TokenKind::OpenTag, TokenKind::Text, TokenKind::CloseTag]);
//!
//! let rebuilt: String = tokens.iter().map(|t| t.text).collect();
//! assert_eq!(rebuilt, "<p class=\"x\">a &lt; b</p>");
//! ```

use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `<name attr="value" ...>` or `<name ... />`; quoted values may hold `>`
    #[regex(r#"<[A-Za-z][A-Za-z0-9-]*([^>"']|"[^"]*"|'[^']*')*>"#)]
    OpenTag,

    /// `</name>`
    #[regex(r"</[A-Za-z][A-Za-z0-9-]*[^>]*>")]
    CloseTag,

    /// Doctype, comment or processing instruction
    #[regex(r"<[!?][^>]*>")]
    Declaration,

    /// A `<` that starts no tag
    #[token("<")]
    Lt,

    /// Character data between tags, entities still encoded
    #[regex(r"[^<]+")]
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

pub fn lex(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut lexer = TokenKind::lexer(input);

    while let Some(result) = lexer.next() {
        // Every byte is covered by some pattern; anything odd reads as text.
        let kind = result.unwrap_or(TokenKind::Text);
        tokens.push(Token {
            kind,
            text: lexer.slice(),
        });
    }

    tokens
}
