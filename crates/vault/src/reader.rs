//! Chunk store reader: loads, verifies and reassembles stored documents.

use crate::error::{VaultError, VaultResult};
use crate::records::from_fields;
use docvault_core::{
    CHUNK_COLLECTION, ChunkRecord, DocumentId, DocumentMetadata, METADATA_COLLECTION, codec,
};
use docvault_storage::RecordStore;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Rebuilds documents from their chunk records.
///
/// Chunks are fetched with a single equality query and ordered client-side;
/// the store is never asked for ordering.
pub struct Reconstructor {
    store: Arc<dyn RecordStore>,
}

impl Reconstructor {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Load the metadata record of a document.
    #[instrument(skip(self), fields(document_id = %document_id))]
    pub async fn metadata(&self, document_id: &DocumentId) -> VaultResult<DocumentMetadata> {
        let fields = self
            .store
            .get(METADATA_COLLECTION, document_id.as_str())
            .await
            .map_err(|e| VaultError::store("read metadata", document_id.as_str(), e))?
            .ok_or_else(|| VaultError::NotFound {
                document_id: document_id.to_string(),
            })?;

        let metadata: DocumentMetadata =
            from_fields(document_id.as_str(), document_id.as_str(), fields)?;
        if metadata.document_id != *document_id {
            return Err(VaultError::corrupt(
                document_id.as_str(),
                format!("metadata names document {}", metadata.document_id),
            ));
        }
        if metadata.total_chunks == 0 {
            return Err(VaultError::corrupt(
                document_id.as_str(),
                "metadata records zero chunks",
            ));
        }
        Ok(metadata)
    }

    /// Fetch every chunk record of a document, in store order.
    pub async fn fetch_chunks(&self, document_id: &DocumentId) -> VaultResult<Vec<ChunkRecord>> {
        let records = self
            .store
            .query_eq(
                CHUNK_COLLECTION,
                "documentId",
                &Value::String(document_id.to_string()),
            )
            .await
            .map_err(|e| VaultError::store("query chunks", document_id.as_str(), e))?;

        records
            .into_iter()
            .map(|record| from_fields(document_id.as_str(), &record.key, record.fields))
            .collect()
    }

    /// Load metadata and chunks and run every integrity check, without joining.
    #[instrument(skip(self), fields(document_id = %document_id))]
    pub async fn load_verified(
        &self,
        document_id: &DocumentId,
    ) -> VaultResult<(DocumentMetadata, Vec<ChunkRecord>)> {
        let metadata = self.metadata(document_id).await?;
        let chunks = self.fetch_chunks(document_id).await?;
        let chunks = verify_and_order(&metadata, chunks)?;

        let joined_len: u64 = chunks
            .iter()
            .map(|chunk| codec::text_len(&chunk.data) as u64)
            .sum();
        if joined_len != metadata.original_size {
            return Err(VaultError::corrupt(
                document_id.as_str(),
                format!(
                    "chunks hold {joined_len} characters, metadata records {}",
                    metadata.original_size
                ),
            ));
        }

        debug!(chunks = chunks.len(), "Verified document chunks");
        Ok((metadata, chunks))
    }

    /// Rebuild the exact payload that was stored.
    pub async fn reconstruct(&self, document_id: &DocumentId) -> VaultResult<String> {
        let (_, chunks) = self.load_verified(document_id).await?;
        Ok(codec::join(chunks.iter().map(|chunk| chunk.data.as_str())))
    }

    /// Check that a document can be reconstructed, returning its metadata.
    pub async fn verify(&self, document_id: &DocumentId) -> VaultResult<DocumentMetadata> {
        let (metadata, _) = self.load_verified(document_id).await?;
        Ok(metadata)
    }
}

/// Check fetched chunks against the metadata and sort them by index.
///
/// Returning fewer chunks than recorded is always an error; a partial
/// document is never reassembled.
pub fn verify_and_order(
    metadata: &DocumentMetadata,
    mut chunks: Vec<ChunkRecord>,
) -> VaultResult<Vec<ChunkRecord>> {
    let document_id = metadata.document_id.as_str();
    let expected = metadata.total_chunks;

    for chunk in &chunks {
        if chunk.document_id != metadata.document_id {
            return Err(VaultError::corrupt(
                document_id,
                format!("chunk {} belongs to {}", chunk.key(), chunk.document_id),
            ));
        }
        if chunk.total_chunks != expected {
            return Err(VaultError::corrupt(
                document_id,
                format!(
                    "chunk {} records {} chunks, metadata records {expected}",
                    chunk.chunk_index, chunk.total_chunks
                ),
            ));
        }
    }

    if chunks.len() != expected as usize {
        let missing = missing_indices(&chunks, expected);
        warn!(
            document_id,
            expected,
            found = chunks.len(),
            missing = missing.len(),
            "Chunk count does not match metadata"
        );
        return Err(VaultError::IncompleteDocument {
            document_id: document_id.to_string(),
            expected,
            found: chunks.len(),
            missing,
        });
    }

    chunks.sort_unstable_by_key(|chunk| chunk.chunk_index);

    // Right count but duplicate or out-of-range indices leave a gap.
    let contiguous = chunks
        .iter()
        .zip(0..expected)
        .all(|(chunk, index)| chunk.chunk_index == index);
    if !contiguous {
        return Err(VaultError::IncompleteDocument {
            document_id: document_id.to_string(),
            expected,
            found: chunks.len(),
            missing: missing_indices(&chunks, expected),
        });
    }

    Ok(chunks)
}

fn missing_indices(chunks: &[ChunkRecord], expected: u32) -> Vec<u32> {
    let present: BTreeSet<u32> = chunks.iter().map(|c| c.chunk_index).collect();
    (0..expected).filter(|i| !present.contains(i)).collect()
}
