/// User-correctable input problems. No mutation happens when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Link URL must not be empty")]
    EmptyUrl,
    #[error("Media source URL must not be empty")]
    EmptySource,
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),
}

/// Configuration faults detected while setting the engine up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Code language allow-list is empty")]
    EmptyLanguageAllowList,
    #[error("Default code language {0:?} is not in the allow-list")]
    DefaultLanguageNotAllowed(String),
}
