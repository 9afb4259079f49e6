use thiserror::Error;

/// Result type for extraction operations
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Errors that can occur during structural extraction
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The grammar rejected the file; no partial symbols are emitted
    #[error("Parse failure in {path}: {reason}")]
    ParseFailure { path: String, reason: String },

    /// A tree-sitter grammar could not be loaded into the parser
    #[error("Grammar error: {0}")]
    Grammar(String),
}

impl ExtractError {
    /// Create a parse failure for a file
    pub fn parse_failure(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ParseFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a grammar error
    pub fn grammar(msg: impl Into<String>) -> Self {
        Self::Grammar(msg.into())
    }
}
