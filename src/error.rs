use thiserror::Error;

pub type Result<T> = std::result::Result<T, CirrusError>;

#[derive(Error, Debug)]
pub enum CirrusError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Timed out after {elapsed_ms}ms: {operation} {container}/{key}")]
    Timeout {
        container: String,
        key: String,
        operation: &'static str,
        elapsed_ms: u64,
    },

    #[error("Partial failure during {operation} on {container}: {failed} member(s) failed")]
    Partial {
        operation: &'static str,
        container: String,
        failed: usize,
        #[source]
        source: Box<CirrusError>,
    },

    #[error("ETag mismatch: expected {expected}, got {actual}")]
    EtagMismatch { expected: String, actual: String },

    #[error("Invalid byte range: {0}")]
    InvalidRange(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    TaskJoin(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tokio::task::JoinError> for CirrusError {
    fn from(err: tokio::task::JoinError) -> Self {
        CirrusError::TaskJoin(err.to_string())
    }
}
