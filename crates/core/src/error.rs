//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid chunk size: {size} (must be between 1 and {max})")]
    InvalidChunkSize { size: usize, max: usize },

    #[error("invalid document id: {0}")]
    InvalidDocumentId(String),

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
