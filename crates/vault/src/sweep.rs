//! Out-of-band cleanup of chunks left behind by interrupted stores.
//!
//! A store that fails between its chunk writes and its metadata write leaves
//! chunks no reader can reach. The sweeper lists chunk records, groups them by
//! document and deletes the chunks of documents that have no metadata, once
//! every chunk of that document is older than the grace period. The grace
//! period protects stores that are still in flight.

use crate::error::{VaultError, VaultResult};
use docvault_core::config::SweepConfig;
use docvault_core::{CHUNK_COLLECTION, METADATA_COLLECTION};
use docvault_storage::RecordStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, instrument, warn};

/// Counters reported by one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepStats {
    /// Chunk records examined.
    pub scanned_chunks: u64,
    /// Documents whose chunks have no metadata record.
    pub orphaned_documents: u64,
    /// Chunk records deleted (zero in dry-run mode).
    pub deleted_chunks: u64,
    /// Orphaned documents left alone because a chunk is within the grace period.
    pub skipped_recent: u64,
    /// Records that could not be examined or deleted.
    pub errors: u64,
}

struct OrphanCandidate {
    keys: Vec<String>,
    newest: OffsetDateTime,
}

/// Deletes chunks that belong to no stored document.
pub struct OrphanSweeper {
    store: Arc<dyn RecordStore>,
    grace_period: time::Duration,
    dry_run: bool,
}

impl OrphanSweeper {
    pub fn new(store: Arc<dyn RecordStore>, grace_period: Duration, dry_run: bool) -> Self {
        Self {
            store,
            grace_period: time::Duration::try_from(grace_period).unwrap_or(time::Duration::MAX),
            dry_run,
        }
    }

    pub fn from_config(store: Arc<dyn RecordStore>, config: &SweepConfig) -> Self {
        Self::new(
            store,
            Duration::from_secs(config.grace_period_secs),
            config.dry_run,
        )
    }

    /// Sweep using the current time.
    pub async fn run(&self) -> VaultResult<SweepStats> {
        self.run_at(OffsetDateTime::now_utc()).await
    }

    /// Sweep as if the current time were `now`.
    #[instrument(skip(self), fields(dry_run = self.dry_run))]
    pub async fn run_at(&self, now: OffsetDateTime) -> VaultResult<SweepStats> {
        let mut stats = SweepStats::default();

        let records = self
            .store
            .list(CHUNK_COLLECTION)
            .await
            .map_err(|e| VaultError::store("list chunks", CHUNK_COLLECTION, e))?;

        let mut by_document: BTreeMap<String, OrphanCandidate> = BTreeMap::new();
        for record in records {
            stats.scanned_chunks += 1;
            let document_id = record.fields.get("documentId").and_then(|v| v.as_str());
            let created_at = record
                .fields
                .get("createdAt")
                .and_then(|v| v.as_str())
                .and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok());
            let (Some(document_id), Some(created_at)) = (document_id, created_at) else {
                warn!(key = %record.key, "Chunk record without documentId/createdAt, skipping");
                stats.errors += 1;
                continue;
            };

            let candidate = by_document
                .entry(document_id.to_string())
                .or_insert_with(|| OrphanCandidate {
                    keys: Vec::new(),
                    newest: created_at,
                });
            candidate.newest = candidate.newest.max(created_at);
            candidate.keys.push(record.key);
        }

        for (document_id, candidate) in by_document {
            match self.store.get(METADATA_COLLECTION, &document_id).await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    warn!(document_id = %document_id, error = %e, "Failed to read metadata, skipping");
                    stats.errors += 1;
                    continue;
                }
            }
            stats.orphaned_documents += 1;

            let age = now - candidate.newest;
            if age < self.grace_period {
                debug!(
                    document_id = %document_id,
                    age_secs = age.whole_seconds(),
                    "Orphaned chunks within grace period, keeping"
                );
                stats.skipped_recent += 1;
                continue;
            }

            if self.dry_run {
                info!(
                    document_id = %document_id,
                    chunks = candidate.keys.len(),
                    age_secs = age.whole_seconds(),
                    "DRY-RUN: Would delete orphaned chunks"
                );
                continue;
            }

            warn!(
                document_id = %document_id,
                chunks = candidate.keys.len(),
                age_secs = age.whole_seconds(),
                "Deleting orphaned chunks without metadata"
            );
            for key in &candidate.keys {
                match self.store.delete(CHUNK_COLLECTION, key).await {
                    Ok(true) => stats.deleted_chunks += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!(key = %key, error = %e, "Failed to delete orphaned chunk");
                        stats.errors += 1;
                    }
                }
            }
        }

        info!(
            scanned_chunks = stats.scanned_chunks,
            orphaned_documents = stats.orphaned_documents,
            deleted_chunks = stats.deleted_chunks,
            skipped_recent = stats.skipped_recent,
            errors = stats.errors,
            "Orphan sweep finished"
        );
        Ok(stats)
    }
}
