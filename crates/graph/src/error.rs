use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    /// A commit referenced a node missing from the post-commit state.
    /// The store is left exactly as it was before the commit.
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// A cooperative cancellation token fired mid-traversal
    #[error("Traversal cancelled")]
    Cancelled,

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("{0}")]
    Other(String),
}

impl GraphError {
    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::IntegrityViolation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NodeNotFound(what.into())
    }

    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        Self::InvalidFilter(msg.into())
    }
}
