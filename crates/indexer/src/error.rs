use codemap_graph::GraphError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extraction error: {0}")]
    Extract(#[from] codemap_extract::ExtractError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Invalid project path: {0}")]
    InvalidPath(String),

    #[error("Event queue closed")]
    QueueClosed,

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    pub fn invalid_path(detail: impl Into<String>) -> Self {
        IndexerError::InvalidPath(detail.into())
    }

    pub fn other(detail: impl Into<String>) -> Self {
        IndexerError::Other(detail.into())
    }

    /// Whether this failure is a cooperative cancellation rather than a fault
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, IndexerError::Graph(GraphError::Cancelled))
    }
}
