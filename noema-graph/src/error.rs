//! Error types for graph-layer operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("verb not found: {0}")]
    VerbNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("core error: {0}")]
    Core(#[from] noema_core::Error),
}

impl From<String> for GraphError {
    fn from(s: String) -> Self {
        Self::InvalidInput(s)
    }
}

impl From<&str> for GraphError {
    fn from(s: &str) -> Self {
        Self::InvalidInput(s.to_string())
    }
}
