//! Chunk store writer: persists a payload as chunk records plus one metadata record.

use crate::error::{VaultError, VaultResult};
use crate::records::to_fields;
use docvault_core::config::VaultConfig;
use docvault_core::{
    CHUNK_COLLECTION, ChunkRecord, DocumentDescriptor, DocumentId, DocumentMetadata,
    METADATA_COLLECTION, codec,
};
use docvault_storage::{RecordStore, lookup_field};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

/// Writes documents into a record store.
///
/// Chunks are written concurrently; the metadata record is written only once
/// every chunk write has been confirmed. A reader that finds metadata can
/// therefore rely on every chunk having been persisted.
pub struct ChunkWriter {
    store: Arc<dyn RecordStore>,
    chunk_size: usize,
    max_parallel_writes: usize,
}

impl ChunkWriter {
    /// Create a writer, validating the chunking configuration.
    pub fn new(store: Arc<dyn RecordStore>, config: &VaultConfig) -> VaultResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            chunk_size: config.chunk_size,
            max_parallel_writes: std::cmp::max(1, config.max_parallel_writes as usize),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Store a payload under a freshly generated id.
    pub async fn store(
        &self,
        payload: &str,
        descriptor: &DocumentDescriptor,
    ) -> VaultResult<DocumentId> {
        let document_id = DocumentId::generate(descriptor.label.as_deref());
        self.store_with_id(&document_id, payload, descriptor)
            .await?;
        Ok(document_id)
    }

    /// Store a payload under a caller-chosen id.
    ///
    /// Re-running with the same id overwrites the document. Chunks left over
    /// from a longer previous payload are deleted before the new metadata is
    /// written. Readers racing the overwrite may see an inconsistent document
    /// until it completes.
    #[instrument(
        skip(self, payload, descriptor),
        fields(document_id = %document_id, original_size = payload.len())
    )]
    pub async fn store_with_id(
        &self,
        document_id: &DocumentId,
        payload: &str,
        descriptor: &DocumentDescriptor,
    ) -> VaultResult<DocumentMetadata> {
        descriptor.validate()?;

        let pieces = codec::split(payload, self.chunk_size)?;
        let total_chunks = u32::try_from(pieces.len()).map_err(|_| {
            VaultError::InvalidInput(format!(
                "payload needs {} chunks, more than a document can hold",
                pieces.len()
            ))
        })?;
        let created_at = OffsetDateTime::now_utc();

        let mut in_flight = FuturesUnordered::new();
        for (chunk_index, piece) in (0..total_chunks).zip(pieces) {
            let record = ChunkRecord {
                document_id: document_id.clone(),
                chunk_index,
                total_chunks,
                data: piece.to_string(),
                created_at,
            };
            in_flight.push(self.write_chunk(record));

            // Dropping the remaining futures on error abandons their writes;
            // no metadata is written either way.
            if in_flight.len() >= self.max_parallel_writes
                && let Some(result) = in_flight.next().await
            {
                result?;
            }
        }

        while let Some(result) = in_flight.next().await {
            result?;
        }

        self.prune_stale_chunks(document_id, total_chunks).await?;

        let metadata = DocumentMetadata {
            document_id: document_id.clone(),
            owner_refs: descriptor.owner_refs.clone(),
            filename: descriptor.filename.clone(),
            content_type: descriptor.content_type.clone(),
            total_chunks,
            original_size: codec::text_len(payload) as u64,
            created_at,
        };
        self.write_metadata(&metadata).await?;

        info!(
            document_id = %document_id,
            chunks = total_chunks,
            original_size = metadata.original_size,
            "Stored document"
        );
        Ok(metadata)
    }

    /// Write one chunk record. Writing the same chunk twice leaves one record.
    pub async fn write_chunk(&self, record: ChunkRecord) -> VaultResult<()> {
        let key = record.key();
        let fields = to_fields(&record)?;
        self.store
            .put(CHUNK_COLLECTION, &key, fields)
            .await
            .map_err(|e| VaultError::store("write chunk", key.as_str(), e))?;
        debug!(
            document_id = %record.document_id,
            chunk_index = record.chunk_index,
            "Wrote chunk"
        );
        Ok(())
    }

    /// Delete chunks of `document_id` at or beyond `total_chunks`.
    async fn prune_stale_chunks(
        &self,
        document_id: &DocumentId,
        total_chunks: u32,
    ) -> VaultResult<usize> {
        let records = self
            .store
            .query_eq(
                CHUNK_COLLECTION,
                "documentId",
                &Value::String(document_id.to_string()),
            )
            .await
            .map_err(|e| VaultError::store("query chunks", document_id.as_str(), e))?;

        let mut pruned = 0;
        for record in records {
            let index = lookup_field(&record.fields, "chunkIndex").and_then(Value::as_u64);
            if index.is_some_and(|index| index < u64::from(total_chunks)) {
                continue;
            }
            self.store
                .delete(CHUNK_COLLECTION, &record.key)
                .await
                .map_err(|e| VaultError::store("delete stale chunk", record.key.as_str(), e))?;
            pruned += 1;
        }

        if pruned > 0 {
            warn!(
                document_id = %document_id,
                pruned,
                "Deleted chunks left over from a previous write"
            );
        }
        Ok(pruned)
    }

    async fn write_metadata(&self, metadata: &DocumentMetadata) -> VaultResult<()> {
        let fields = to_fields(metadata)?;
        self.store
            .put(METADATA_COLLECTION, metadata.document_id.as_str(), fields)
            .await
            .map_err(|e| VaultError::store("write metadata", metadata.document_id.as_str(), e))
    }
}
