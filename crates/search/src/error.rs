use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Empty query")]
    EmptyQuery,

    #[error("Vector backend error: {0}")]
    VectorBackend(String),

    #[error("{0}")]
    Other(String),
}

impl SearchError {
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::VectorBackend(reason.into())
    }
}
