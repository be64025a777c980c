//! Error types for snapflow

use thiserror::Error;

/// Result type alias for snapflow operations
pub type Result<T> = std::result::Result<T, SnapflowError>;

/// Main error type for snapflow
#[derive(Error, Debug)]
pub enum SnapflowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Not found: {0}")]
    NotFound(String),
}
