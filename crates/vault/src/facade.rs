//! Document lifecycle facade: the public entry points over writer, reader and cache.

use crate::batch::{BatchReport, run_bounded};
use crate::cache::DocumentCache;
use crate::error::{VaultError, VaultResult};
use crate::reader::Reconstructor;
use crate::records::from_fields;
use crate::render::DocumentRenderer;
use crate::sweep::OrphanSweeper;
use crate::writer::ChunkWriter;
use docvault_core::config::{AppConfig, SweepConfig, VaultConfig};
use docvault_core::{
    DataUri, DocumentDescriptor, DocumentId, DocumentMetadata, METADATA_COLLECTION,
    decode_payload, to_data_uri,
};
use docvault_storage::RecordStore;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};
use uuid::Uuid;

/// Stores and reconstructs chunked documents.
pub struct DocumentVault {
    store: Arc<dyn RecordStore>,
    writer: ChunkWriter,
    reader: Reconstructor,
    cache: Option<DocumentCache>,
    config: VaultConfig,
}

impl DocumentVault {
    /// Create a vault over `store` without a cache.
    pub fn new(store: Arc<dyn RecordStore>, config: VaultConfig) -> VaultResult<Self> {
        let writer = ChunkWriter::new(store.clone(), &config)?;
        Ok(Self {
            reader: Reconstructor::new(store.clone()),
            store,
            writer,
            cache: None,
            config,
        })
    }

    /// Attach a cache of reconstructed payloads.
    pub fn with_cache(mut self, cache: DocumentCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Open the configured store and build a vault over it.
    pub async fn from_config(config: &AppConfig) -> VaultResult<Self> {
        config.validate()?;
        let store = docvault_storage::from_config(&config.store, config.vault.max_record_bytes)
            .await
            .map_err(|e| VaultError::store("open store", config.store.describe(), e))?;
        let vault = Self::new(store, config.vault.clone())?;
        Ok(match DocumentCache::from_config(&config.cache) {
            Some(cache) => vault.with_cache(cache),
            None => vault,
        })
    }

    pub fn store_handle(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn writer(&self) -> &ChunkWriter {
        &self.writer
    }

    pub fn reader(&self) -> &Reconstructor {
        &self.reader
    }

    pub fn cache(&self) -> Option<&DocumentCache> {
        self.cache.as_ref()
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Store a payload and return the id of the new document.
    pub async fn store(
        &self,
        payload: &str,
        descriptor: &DocumentDescriptor,
    ) -> VaultResult<DocumentId> {
        self.writer.store(payload, descriptor).await
    }

    /// Store a payload under a caller-chosen id, replacing any document
    /// already stored there.
    pub async fn store_with_id(
        &self,
        document_id: &DocumentId,
        payload: &str,
        descriptor: &DocumentDescriptor,
    ) -> VaultResult<DocumentMetadata> {
        let result = self
            .writer
            .store_with_id(document_id, payload, descriptor)
            .await;
        if let Some(cache) = &self.cache {
            cache.remove(document_id);
        }
        result
    }

    /// Reconstruct the stored payload.
    ///
    /// Served from the cache when possible. The configured timeout, if any,
    /// bounds the call.
    pub async fn reconstruct(&self, document_id: &DocumentId) -> VaultResult<Arc<str>> {
        match self.config.reconstruct_timeout() {
            Some(timeout) => self.reconstruct_with_timeout(document_id, timeout).await,
            None => self.load(document_id).await,
        }
    }

    /// Reconstruct with an explicit bound on the whole call.
    pub async fn reconstruct_with_timeout(
        &self,
        document_id: &DocumentId,
        timeout: Duration,
    ) -> VaultResult<Arc<str>> {
        tokio::time::timeout(timeout, self.load(document_id))
            .await
            .map_err(|_| VaultError::Timeout {
                document_id: document_id.to_string(),
                after: timeout,
            })?
    }

    async fn load(&self, document_id: &DocumentId) -> VaultResult<Arc<str>> {
        if let Some(cache) = &self.cache
            && let Some(payload) = cache.get(document_id)
        {
            return Ok(payload);
        }

        let payload: Arc<str> = Arc::from(self.reader.reconstruct(document_id).await?);
        if let Some(cache) = &self.cache {
            cache.insert(document_id.clone(), payload.clone());
        }
        Ok(payload)
    }

    /// Metadata of a stored document, without reconstructing it.
    pub async fn metadata(&self, document_id: &DocumentId) -> VaultResult<DocumentMetadata> {
        self.reader.metadata(document_id).await
    }

    /// Run every integrity check on a stored document.
    pub async fn verify(&self, document_id: &DocumentId) -> VaultResult<DocumentMetadata> {
        self.reader.verify(document_id).await
    }

    /// Reconstruct and decode to raw bytes.
    pub async fn reconstruct_bytes(&self, document_id: &DocumentId) -> VaultResult<Vec<u8>> {
        let payload = self.reconstruct(document_id).await?;
        decode_payload(&payload).map_err(|e| VaultError::MalformedPayload {
            document_id: document_id.to_string(),
            reason: e.to_string(),
        })
    }

    /// Decode a document and write it to `<dir>/<filename>`.
    #[instrument(skip(self, dir), fields(document_id = %document_id))]
    pub async fn download_to_local(
        &self,
        document_id: &DocumentId,
        dir: &Path,
    ) -> VaultResult<PathBuf> {
        let metadata = self.metadata(document_id).await?;
        let filename = Path::new(&metadata.filename);
        if filename.file_name() != Some(filename.as_os_str()) {
            return Err(VaultError::corrupt(
                document_id.as_str(),
                format!("filename is not a plain file name: {}", metadata.filename),
            ));
        }
        let bytes = self.reconstruct_bytes(document_id).await?;

        let path = dir.join(filename);
        write_atomic(&path, &bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "Downloaded document");
        Ok(path)
    }

    /// The document as a `data:` URI for an embedding surface.
    pub async fn render_inline(&self, document_id: &DocumentId) -> VaultResult<String> {
        let payload = self.reconstruct(document_id).await?;
        if DataUri::parse(&payload).is_some() {
            return Ok(payload.to_string());
        }
        let metadata = self.metadata(document_id).await?;
        Ok(to_data_uri(&payload, &metadata.content_type).into_owned())
    }

    /// Render a document with `renderer` and store the result.
    pub async fn render_and_store<I, R>(
        &self,
        renderer: &R,
        input: &I,
        descriptor: &DocumentDescriptor,
    ) -> VaultResult<DocumentId>
    where
        I: ?Sized + Sync,
        R: DocumentRenderer<I> + ?Sized,
    {
        let rendered = renderer.render(input).await.map_err(VaultError::Render)?;
        self.store(&rendered.payload, descriptor).await
    }

    /// Documents whose owner reference `ref_key` equals `ref_value`, newest first.
    pub async fn find_documents(
        &self,
        ref_key: &str,
        ref_value: &str,
    ) -> VaultResult<Vec<DocumentMetadata>> {
        if ref_key.is_empty() || ref_key.contains('.') {
            return Err(VaultError::InvalidInput(format!(
                "invalid owner reference key: {ref_key:?}"
            )));
        }
        let field_path = format!("ownerRefs.{ref_key}");
        let records = self
            .store
            .query_eq(
                METADATA_COLLECTION,
                &field_path,
                &Value::String(ref_value.to_string()),
            )
            .await
            .map_err(|e| VaultError::store("find documents", field_path.as_str(), e))?;

        let mut documents = records
            .into_iter()
            .map(|record| from_fields::<DocumentMetadata>(&record.key, &record.key, record.fields))
            .collect::<VaultResult<Vec<_>>>()?;
        documents.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.document_id.cmp(&a.document_id))
        });
        Ok(documents)
    }

    /// Reconstruct many documents with bounded concurrency.
    pub async fn reconstruct_many(
        &self,
        ids: &[DocumentId],
        concurrency: usize,
    ) -> BatchReport<Arc<str>> {
        run_bounded(ids, concurrency, |id| async move { self.reconstruct(&id).await }).await
    }

    /// Download many documents into `dir` with bounded concurrency.
    pub async fn export_batch(
        &self,
        ids: &[DocumentId],
        dir: &Path,
        concurrency: usize,
    ) -> BatchReport<PathBuf> {
        run_bounded(ids, concurrency, |id| async move {
            self.download_to_local(&id, dir).await
        })
        .await
    }

    /// An orphan sweeper over this vault's store.
    pub fn sweeper(&self, config: &SweepConfig) -> OrphanSweeper {
        OrphanSweeper::from_config(self.store.clone(), config)
    }
}

/// Write `bytes` to `path` through a temp file and rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> VaultResult<()> {
    let io_err = |source| VaultError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(format!(".tmp.{}", Uuid::new_v4()));
    let temp_path = PathBuf::from(temp_name);
    {
        let mut file = tokio::fs::File::create(&temp_path).await.map_err(io_err)?;
        file.write_all(bytes).await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;
    }
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(io_err(e));
    }
    Ok(())
}
