//! Record store error types.

use thiserror::Error;

/// Record store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("record {collection}/{key} is {size} bytes, exceeding the {limit} byte limit")]
    RecordTooLarge {
        collection: String,
        key: String,
        size: usize,
        limit: usize,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io(_) | Self::Unavailable(_) => true,
            Self::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            Self::Serialization(_)
            | Self::InvalidKey(_)
            | Self::RecordTooLarge { .. }
            | Self::Config(_) => false,
        }
    }
}

/// Result type for record store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
