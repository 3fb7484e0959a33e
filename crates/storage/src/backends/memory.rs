//! In-memory record store.

use crate::error::StoreResult;
use crate::traits::{Fields, RecordStore, StoredRecord, encode_record, lookup_field, validate_name};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::instrument;

type Collections = HashMap<String, HashMap<String, Fields>>;

/// Process-local record store.
///
/// Enforces the same record size ceiling as the persistent backends so that
/// tests exercise the real limits.
pub struct MemoryStore {
    collections: RwLock<Collections>,
    max_record_bytes: usize,
}

impl MemoryStore {
    pub fn new(max_record_bytes: usize) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            max_record_bytes,
        }
    }

    /// Number of records in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .map_or(0, HashMap::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(docvault_core::DEFAULT_MAX_RECORD_BYTES)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    #[instrument(skip(self, fields), fields(backend = "memory"))]
    async fn put(&self, collection: &str, key: &str, fields: Fields) -> StoreResult<()> {
        validate_name(collection)?;
        validate_name(key)?;
        encode_record(collection, key, &fields, self.max_record_bytes)?;
        self.collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), fields);
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Fields>> {
        Ok(self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .and_then(|records| records.get(key))
            .cloned())
    }

    #[instrument(skip(self, value), fields(backend = "memory"))]
    async fn query_eq(
        &self,
        collection: &str,
        field_path: &str,
        value: &Value,
    ) -> StoreResult<Vec<StoredRecord>> {
        let collections = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(records) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(records
            .iter()
            .filter(|(_, fields)| lookup_field(fields, field_path) == Some(value))
            .map(|(key, fields)| StoredRecord {
                key: key.clone(),
                fields: fields.clone(),
            })
            .collect())
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn delete(&self, collection: &str, key: &str) -> StoreResult<bool> {
        Ok(self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(collection)
            .and_then(|records| records.remove(key))
            .is_some())
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn list(&self, collection: &str) -> StoreResult<Vec<StoredRecord>> {
        Ok(self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .map(|(key, fields)| StoredRecord {
                        key: key.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn max_record_bytes(&self) -> usize {
        self.max_record_bytes
    }
}
