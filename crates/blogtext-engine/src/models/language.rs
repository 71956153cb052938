use crate::error::EngineError;

pub const DEFAULT_LANGUAGES: [&str; 10] = [
    "html",
    "css",
    "javascript",
    "typescript",
    "tsx",
    "go",
    "python",
    "java",
    "json",
    "sql",
];

pub const DEFAULT_LANGUAGE: &str = "javascript";

/// Allow-list of code block languages with a single fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePolicy {
    languages: Vec<String>,
    default_language: String,
}

impl Default for LanguagePolicy {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect(),
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl LanguagePolicy {
    /// Identifiers are compared case-insensitively and stored lower-cased.
    pub fn new<I, S>(languages: I, default_language: &str) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for language in languages {
            let language = language.as_ref().trim().to_lowercase();
            if !language.is_empty() && !normalized.contains(&language) {
                normalized.push(language);
            }
        }
        if normalized.is_empty() {
            return Err(EngineError::EmptyLanguageAllowList);
        }

        let default_language = default_language.trim().to_lowercase();
        if !normalized.contains(&default_language) {
            return Err(EngineError::DefaultLanguageNotAllowed(default_language));
        }

        Ok(Self {
            languages: normalized,
            default_language,
        })
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub fn is_allowed(&self, language: &str) -> bool {
        let language = language.trim().to_lowercase();
        self.languages.contains(&language)
    }

    /// Map any requested language onto the allow-list.
    pub fn resolve(&self, requested: Option<&str>) -> String {
        match requested.map(|l| l.trim().to_lowercase()) {
            Some(language) if self.languages.contains(&language) => language,
            Some(language) if !language.is_empty() => {
                log::debug!(
                    "code language {language:?} not allowed, using {:?}",
                    self.default_language
                );
                self.default_language.clone()
            }
            _ => self.default_language.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("python"), "python")]
    #[case(Some("  TSX "), "tsx")]
    #[case(Some("brainfuck"), "javascript")]
    #[case(Some(""), "javascript")]
    #[case(None, "javascript")]
    fn resolve_maps_onto_allow_list(#[case] requested: Option<&str>, #[case] expected: &str) {
        assert_eq!(LanguagePolicy::default().resolve(requested), expected);
    }

    #[test]
    fn empty_allow_list_is_rejected() {
        let empty: [&str; 0] = [];
        assert_eq!(
            LanguagePolicy::new(empty, "rust"),
            Err(EngineError::EmptyLanguageAllowList)
        );
    }

    #[test]
    fn default_must_be_allowed() {
        assert_eq!(
            LanguagePolicy::new(["go", "rust"], "python"),
            Err(EngineError::DefaultLanguageNotAllowed("python".to_string()))
        );
        let policy = LanguagePolicy::new(["Go", "rust", "go"], "Rust").unwrap();
        assert_eq!(policy.languages(), ["go", "rust"]);
        assert_eq!(policy.default_language(), "rust");
        assert!(policy.is_allowed("GO"));
    }
}
