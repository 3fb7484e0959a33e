//! Vault error types.

use docvault_storage::StoreError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Format missing chunk indices for display, capping at MAX_DISPLAYED to prevent log bloat.
fn format_missing_indices(indices: &[u32]) -> String {
    const MAX_DISPLAYED: usize = 5;
    if indices.len() <= MAX_DISPLAYED {
        format!("{indices:?}")
    } else {
        let sample = &indices[..MAX_DISPLAYED];
        format!("{sample:?} (and {} more)", indices.len() - MAX_DISPLAYED)
    }
}

/// Errors surfaced by the writer, the reader and the facade.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("document not found: {document_id}")]
    NotFound { document_id: String },

    #[error(
        "document {document_id} is incomplete: expected {expected} chunks, found {found}, missing {}",
        format_missing_indices(.missing)
    )]
    IncompleteDocument {
        document_id: String,
        expected: u32,
        found: usize,
        missing: Vec<u32>,
    },

    #[error("malformed payload for document {document_id}: {reason}")]
    MalformedPayload { document_id: String, reason: String },

    #[error("store unavailable during {operation} ({target}): {source}")]
    StoreUnavailable {
        operation: &'static str,
        target: String,
        #[source]
        source: StoreError,
    },

    #[error("corrupt record for document {document_id}: {reason}")]
    CorruptRecord { document_id: String, reason: String },

    #[error("timed out after {after:?} reconstructing document {document_id}")]
    Timeout { document_id: String, after: Duration },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("renderer failed: {0}")]
    Render(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl VaultError {
    /// Whether retrying the same call could succeed.
    ///
    /// Incomplete documents may still be settling in an eventually consistent
    /// store; transport failures and timeouts are transient. Missing, malformed
    /// and corrupt documents stay that way.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::IncompleteDocument { .. } | Self::StoreUnavailable { .. } | Self::Timeout { .. }
        )
    }

    /// Document id carried by the error, when there is one.
    pub fn document_id(&self) -> Option<&str> {
        match self {
            Self::NotFound { document_id }
            | Self::IncompleteDocument { document_id, .. }
            | Self::MalformedPayload { document_id, .. }
            | Self::CorruptRecord { document_id, .. }
            | Self::Timeout { document_id, .. } => Some(document_id),
            _ => None,
        }
    }

    /// Classify a record store failure.
    ///
    /// Rejected keys and oversized records are caller mistakes, undecodable
    /// records are corruption; everything else is the store being unavailable.
    pub(crate) fn store(operation: &'static str, target: impl Into<String>, err: StoreError) -> Self {
        let target = target.into();
        match err {
            StoreError::InvalidKey(_) | StoreError::RecordTooLarge { .. } => {
                Self::InvalidInput(format!("{operation} ({target}): {err}"))
            }
            StoreError::Serialization(e) => Self::CorruptRecord {
                document_id: target,
                reason: e.to_string(),
            },
            source => Self::StoreUnavailable {
                operation,
                target,
                source,
            },
        }
    }

    pub(crate) fn corrupt(document_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            document_id: document_id.into(),
            reason: reason.into(),
        }
    }
}

impl From<docvault_core::Error> for VaultError {
    fn from(err: docvault_core::Error) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

/// Result type for vault operations.
pub type VaultResult<T> = std::result::Result<T, VaultError>;
