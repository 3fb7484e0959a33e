//! Local filesystem record store.
//!
//! Layout: `<root>/<collection>/<key>.json`, one file per record.

use crate::error::{StoreError, StoreResult};
use crate::traits::{Fields, RecordStore, StoredRecord, encode_record, lookup_field, validate_name};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

const RECORD_EXTENSION: &str = ".json";

/// Local filesystem record store.
pub struct FilesystemBackend {
    root: PathBuf,
    max_record_bytes: usize,
}

impl FilesystemBackend {
    /// Create a new filesystem backend rooted at `root`.
    pub async fn new(root: impl AsRef<Path>, max_record_bytes: usize) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            max_record_bytes,
        })
    }

    /// Directory of a collection, with path traversal protection.
    async fn collection_dir(&self, collection: &str) -> StoreResult<PathBuf> {
        validate_name(collection)?;
        let root = self.root.clone();
        let dir = self.root.join(collection);
        let checked = dir.clone();
        tokio::task::spawn_blocking(move || ensure_within_root(&root, &checked))
            .await
            .map_err(|e| {
                StoreError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })??;
        Ok(dir)
    }

    async fn record_path(&self, collection: &str, key: &str) -> StoreResult<PathBuf> {
        validate_name(key)?;
        let dir = self.collection_dir(collection).await?;
        Ok(dir.join(format!("{key}{RECORD_EXTENSION}")))
    }

    async fn read_record(path: &Path) -> StoreResult<Option<Fields>> {
        match fs::read(path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Read every record file of a collection directory.
    async fn scan(&self, collection: &str) -> StoreResult<Vec<StoredRecord>> {
        let dir = self.collection_dir(collection).await?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            // Use file_type() so symlinks are never followed out of the root.
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(key) = name
                .to_str()
                .and_then(|n| n.strip_suffix(RECORD_EXTENSION))
            else {
                continue;
            };
            // A concurrent delete between read_dir and read is not an error.
            if let Some(fields) = Self::read_record(&entry.path()).await? {
                records.push(StoredRecord {
                    key: key.to_string(),
                    fields,
                });
            }
        }
        Ok(records)
    }
}

/// Reject a path that resolves outside `root` through a symlink.
fn ensure_within_root(root: &Path, path: &Path) -> StoreResult<()> {
    let root_canonical = root.canonicalize().map_err(|e| {
        StoreError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to canonicalize root: {e}"),
        ))
    })?;

    match std::fs::symlink_metadata(path) {
        Ok(meta) => {
            let canonical = path.canonicalize().map_err(|_| {
                if meta.file_type().is_symlink() {
                    StoreError::InvalidKey(format!(
                        "symlink target missing or invalid: {}",
                        path.display()
                    ))
                } else {
                    StoreError::InvalidKey(format!("cannot resolve path: {}", path.display()))
                }
            })?;
            if !canonical.starts_with(&root_canonical) {
                return Err(StoreError::InvalidKey(format!(
                    "resolved path escapes storage root: {}",
                    path.display()
                )));
            }
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(StoreError::Io(err)),
    }
}

#[async_trait]
impl RecordStore for FilesystemBackend {
    #[instrument(skip(self, fields), fields(backend = "filesystem"))]
    async fn put(&self, collection: &str, key: &str, fields: Fields) -> StoreResult<()> {
        let encoded = encode_record(collection, key, &fields, self.max_record_bytes)?;
        let path = self.record_path(collection, key).await?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to a uniquely named temp file, fsync, then rename so readers
        // never observe a partial record and concurrent writers do not collide.
        let temp_path = path.with_file_name(format!("{key}{RECORD_EXTENSION}.tmp.{}", Uuid::new_v4()));
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(encoded.as_bytes()).await?;
            file.sync_all().await?;
        }
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StoreError::Io(e));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Fields>> {
        let path = self.record_path(collection, key).await?;
        Self::read_record(&path).await
    }

    #[instrument(skip(self, value), fields(backend = "filesystem"))]
    async fn query_eq(
        &self,
        collection: &str,
        field_path: &str,
        value: &Value,
    ) -> StoreResult<Vec<StoredRecord>> {
        let mut records = self.scan(collection).await?;
        records.retain(|record| lookup_field(&record.fields, field_path) == Some(value));
        Ok(records)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, collection: &str, key: &str) -> StoreResult<bool> {
        let path = self.record_path(collection, key).await?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn list(&self, collection: &str) -> StoreResult<Vec<StoredRecord>> {
        self.scan(collection).await
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    fn max_record_bytes(&self) -> usize {
        self.max_record_bytes
    }

    async fn health_check(&self) -> StoreResult<()> {
        let meta = fs::metadata(&self.root).await?;
        if meta.is_dir() {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!(
                "storage root is not a directory: {}",
                self.root.display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_record_layout_on_disk() {
        let temp = tempfile::tempdir().unwrap();
        let store = FilesystemBackend::new(temp.path(), 1024).await.unwrap();
        let fields = json!({"v": 1}).as_object().cloned().unwrap();
        store.put("chunks", "d1_chunk_0", fields).await.unwrap();
        assert!(temp.path().join("chunks").join("d1_chunk_0.json").is_file());
    }

    #[tokio::test]
    async fn test_leftover_temp_files_are_ignored() {
        let temp = tempfile::tempdir().unwrap();
        let store = FilesystemBackend::new(temp.path(), 1024).await.unwrap();
        let fields = json!({"v": 1}).as_object().cloned().unwrap();
        store.put("c", "k", fields).await.unwrap();
        std::fs::write(temp.path().join("c").join("k.json.tmp.abc"), b"{").unwrap();
        let records = store.list("c").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "k");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_collection_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let store = FilesystemBackend::new(temp.path(), 1024).await.unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("escape")).unwrap();
        let fields = json!({"v": 1}).as_object().cloned().unwrap();
        let err = store.put("escape", "k", fields).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }
}
