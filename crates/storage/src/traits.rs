//! Record store trait definitions.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;

/// The fields of one record.
pub type Fields = serde_json::Map<String, Value>;

/// A record returned by queries, with its key.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredRecord {
    pub key: String,
    pub fields: Fields,
}

/// Document database client.
///
/// Collections hold independent records addressed by key. Writes to
/// different records are not atomic with each other, and queries support
/// equality only with no ordering guarantee.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Create or overwrite the record at `key`.
    async fn put(&self, collection: &str, key: &str, fields: Fields) -> StoreResult<()>;

    /// Read one record.
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Fields>>;

    /// All records whose field at `field_path` equals `value`.
    ///
    /// `field_path` may address nested objects with dots (`ownerRefs.kind`).
    /// Results come back in no particular order.
    async fn query_eq(
        &self,
        collection: &str,
        field_path: &str,
        value: &Value,
    ) -> StoreResult<Vec<StoredRecord>>;

    /// Delete one record. Returns whether a record was removed.
    async fn delete(&self, collection: &str, key: &str) -> StoreResult<bool>;

    /// Every record of a collection, in no particular order.
    async fn list(&self, collection: &str) -> StoreResult<Vec<StoredRecord>>;

    /// Static backend identifier used in logs.
    fn backend_name(&self) -> &'static str;

    /// Per-record size ceiling enforced by this backend.
    fn max_record_bytes(&self) -> usize;

    /// Verify backend connectivity.
    ///
    /// The default implementation returns Ok(()), suitable for backends
    /// without a remote side.
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Look up a possibly nested field by dotted path.
pub fn lookup_field<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Reject collection names and keys that cannot be stored safely.
///
/// Names double as file names in the filesystem backend, so the rules are
/// the strictest of all backends.
pub fn validate_name(name: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Err(StoreError::InvalidKey("empty name".to_string()));
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') || name.starts_with('.')
    {
        return Err(StoreError::InvalidKey(format!(
            "path traversal not allowed: {name}"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(StoreError::InvalidKey(format!(
            "control characters not allowed: {name:?}"
        )));
    }
    Ok(())
}

/// Serialize a record, enforcing the per-record size ceiling.
///
/// The size counts the encoded fields plus the key, the way a document
/// database accounts a record against its limit.
pub fn encode_record(
    collection: &str,
    key: &str,
    fields: &Fields,
    limit: usize,
) -> StoreResult<String> {
    let encoded = serde_json::to_string(fields)?;
    let size = encoded.len() + key.len();
    if size > limit {
        return Err(StoreError::RecordTooLarge {
            collection: collection.to_string(),
            key: key.to_string(),
            size,
            limit,
        });
    }
    Ok(encoded)
}
