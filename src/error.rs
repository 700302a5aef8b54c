//! Error types for the embedding store

use thiserror::Error;

/// Result type alias for embeddb operations
pub type Result<T> = std::result::Result<T, EmbedDbError>;

/// Error types that can occur in embedding store operations
#[derive(Error, Debug)]
pub enum EmbedDbError {
    #[error("Dimensionality mismatch: expected {expected}, got {actual}")]
    Dimensionality { expected: usize, actual: usize },

    #[error("Record not found: {id}")]
    NotFound { id: String },

    #[error("Invalid request: {reason}")]
    Validation { reason: String },

    #[error("Unauthorized access to space: {space}")]
    Unauthorized { space: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index error: {0}")]
    Index(String),
}
