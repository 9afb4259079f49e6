use thiserror::Error;

pub type Result<T> = std::result::Result<T, RiskError>;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Malformed diff: {0}")]
    MalformedDiff(String),

    #[error("Graph error: {0}")]
    Graph(#[from] codemap_graph::GraphError),
}

impl RiskError {
    pub fn malformed_diff(reason: impl Into<String>) -> Self {
        Self::MalformedDiff(reason.into())
    }
}
