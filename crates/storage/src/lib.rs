//! Record store abstraction and backends for docvault.
//!
//! This crate provides:
//! - A keyed record store trait grouped by named collections
//! - Equality queries on (optionally nested) record fields
//! - A per-record size limit enforced before anything is written
//! - Backends: in-memory, SQLite and local filesystem

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{filesystem::FilesystemBackend, memory::MemoryStore, sqlite::SqliteStore};
pub use error::{StoreError, StoreResult};
pub use traits::{Fields, RecordStore, StoredRecord, lookup_field};

use docvault_core::config::StoreConfig;
use std::sync::Arc;

/// Create a record store from configuration.
pub async fn from_config(
    config: &StoreConfig,
    max_record_bytes: usize,
) -> StoreResult<Arc<dyn RecordStore>> {
    config.validate().map_err(StoreError::Config)?;

    match config {
        StoreConfig::Memory => Ok(Arc::new(MemoryStore::new(max_record_bytes))),
        StoreConfig::Sqlite { path } => {
            let store = SqliteStore::new(path, max_record_bytes).await?;
            Ok(Arc::new(store))
        }
        StoreConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path, max_record_bytes).await?;
            Ok(Arc::new(backend))
        }
    }
}
