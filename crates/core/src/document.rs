//! Document identifiers, chunk records and document metadata.

use crate::{DEFAULT_CONTENT_TYPE, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use time::OffsetDateTime;
use time::macros::format_description;
use uuid::Uuid;

/// Collection holding one record per chunk.
pub const CHUNK_COLLECTION: &str = "document_chunks";

/// Collection holding one metadata record per document.
pub const METADATA_COLLECTION: &str = "document_metadata";

const MAX_ID_LEN: usize = 200;
const MAX_LABEL_LEN: usize = 64;
const DEFAULT_LABEL: &str = "doc";

/// Identifier of a stored document.
///
/// Generated ids sort by creation time within a label, which keeps them
/// readable in logs; uniqueness comes from the random suffix.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Generate a fresh id of the form `<label>_<utc timestamp>_<random>`.
    pub fn generate(label: Option<&str>) -> Self {
        let label = sanitize_label(label.unwrap_or(DEFAULT_LABEL));
        let now = OffsetDateTime::now_utc();
        let stamp = now
            .format(format_description!(
                "[year][month][day]T[hour][minute][second][subsecond digits:3]Z"
            ))
            .unwrap_or_else(|_| now.unix_timestamp().to_string());
        let random = Uuid::new_v4().simple().to_string();
        Self(format!("{label}_{stamp}_{}", &random[..8]))
    }

    /// Parse and validate an existing id.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidDocumentId("empty id".to_string()));
        }
        if s.len() > MAX_ID_LEN {
            return Err(Error::InvalidDocumentId(format!(
                "id longer than {MAX_ID_LEN} bytes"
            )));
        }
        if s.contains("..") || s.contains('/') || s.contains('\\') {
            return Err(Error::InvalidDocumentId(format!(
                "path separators not allowed: {s}"
            )));
        }
        if s.starts_with('.') {
            return Err(Error::InvalidDocumentId(format!(
                "leading '.' not allowed: {s}"
            )));
        }
        if s.chars().any(char::is_control) {
            return Err(Error::InvalidDocumentId(
                "control characters not allowed".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .take(MAX_LABEL_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() {
        DEFAULT_LABEL.to_string()
    } else {
        cleaned
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Record key of one chunk. Re-writing the same (id, index) overwrites.
pub fn chunk_key(document_id: &DocumentId, chunk_index: u32) -> String {
    format!("{document_id}_chunk_{chunk_index}")
}

/// Caller-supplied description of a document being stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDescriptor {
    /// Opaque correlation fields (originating entity, document kind, ...).
    #[serde(default)]
    pub owner_refs: BTreeMap<String, String>,
    /// File name used when the document is saved locally.
    pub filename: String,
    /// MIME type of the decoded payload.
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Human-readable prefix for the generated id.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

impl DocumentDescriptor {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            owner_refs: BTreeMap::new(),
            filename: filename.into(),
            content_type: default_content_type(),
            label: None,
        }
    }

    pub fn with_ref(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.owner_refs.insert(key.into(), value.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Check that the filename can be used as a single local path component.
    pub fn validate(&self) -> Result<()> {
        let name = self.filename.as_str();
        if name.trim().is_empty() {
            return Err(Error::InvalidDescriptor("filename is empty".to_string()));
        }
        if name == "." || name == ".." || name.contains('/') || name.contains('\\') {
            return Err(Error::InvalidDescriptor(format!(
                "filename must be a plain file name: {name}"
            )));
        }
        if self.content_type.trim().is_empty() {
            return Err(Error::InvalidDescriptor("content type is empty".to_string()));
        }
        Ok(())
    }
}

/// One stored slice of a document payload.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRecord {
    pub document_id: DocumentId,
    /// Zero-based position within the document.
    pub chunk_index: u32,
    /// Number of chunks of the document; identical on every chunk.
    pub total_chunks: u32,
    pub data: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl ChunkRecord {
    /// Record key of this chunk.
    pub fn key(&self) -> String {
        chunk_key(&self.document_id, self.chunk_index)
    }
}

impl fmt::Debug for ChunkRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkRecord")
            .field("document_id", &self.document_id)
            .field("chunk_index", &self.chunk_index)
            .field("total_chunks", &self.total_chunks)
            .field("len", &self.data.len())
            .finish()
    }
}

/// The single record describing a stored document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub document_id: DocumentId,
    #[serde(default)]
    pub owner_refs: BTreeMap<String, String>,
    pub filename: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    pub total_chunks: u32,
    /// Length of the full payload before splitting.
    pub original_size: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
