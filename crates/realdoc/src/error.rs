use thiserror::Error;

/// Result type for realdoc operations
pub type RealdocResult<T> = Result<T, RealdocError>;

/// Errors that can occur in realdoc operations
#[derive(Error, Debug)]
pub enum RealdocError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}
