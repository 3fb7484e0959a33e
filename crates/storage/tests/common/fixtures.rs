use docvault_storage::{FilesystemBackend, Fields, MemoryStore, RecordStore, SqliteStore};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;

/// Backends exercised by the shared test suites.
#[allow(dead_code)]
#[derive(Clone, Copy, Debug)]
pub enum BackendKind {
    Memory,
    Sqlite,
    Filesystem,
}

#[allow(dead_code)]
impl BackendKind {
    pub const ALL: [BackendKind; 3] = [Self::Memory, Self::Sqlite, Self::Filesystem];
}

/// Build a store of the given kind. The returned TempDir must outlive the store.
#[allow(dead_code)]
pub async fn make_store(kind: BackendKind, limit: usize) -> (Arc<dyn RecordStore>, TempDir) {
    let temp = TempDir::new().unwrap();
    let store: Arc<dyn RecordStore> = match kind {
        BackendKind::Memory => Arc::new(MemoryStore::new(limit)),
        BackendKind::Sqlite => Arc::new(
            SqliteStore::new(temp.path().join("records.db"), limit)
                .await
                .unwrap(),
        ),
        BackendKind::Filesystem => Arc::new(
            FilesystemBackend::new(temp.path().join("records"), limit)
                .await
                .unwrap(),
        ),
    };
    (store, temp)
}

/// Convert a JSON object literal into record fields.
#[allow(dead_code)]
pub fn record(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Fields shaped like a stored chunk.
#[allow(dead_code)]
pub fn chunk_fields(document_id: &str, index: u32, total: u32, data: &str) -> Fields {
    record(json!({
        "documentId": document_id,
        "chunkIndex": index,
        "totalChunks": total,
        "data": data,
        "createdAt": "2026-01-01T00:00:00Z",
    }))
}
