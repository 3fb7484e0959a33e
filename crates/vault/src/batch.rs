//! Bounded-concurrency batch processing with per-document outcomes.

use crate::error::VaultResult;
use docvault_core::DocumentId;
use futures::stream::{self, StreamExt};
use std::future::Future;
use tracing::warn;

/// Outcome of one document in a batch.
#[derive(Debug)]
pub struct BatchItem<T> {
    pub document_id: DocumentId,
    pub outcome: VaultResult<T>,
}

/// Outcomes of a batch, in input order.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub items: Vec<BatchItem<T>>,
}

impl<T> BatchReport<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|item| item.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Items that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = &BatchItem<T>> {
        self.items.iter().filter(|item| item.outcome.is_err())
    }
}

/// Run `op` for every id with at most `concurrency` in flight.
///
/// A failure is recorded against its document and never stops the batch.
pub(crate) async fn run_bounded<T, F, Fut>(
    ids: &[DocumentId],
    concurrency: usize,
    op: F,
) -> BatchReport<T>
where
    F: Fn(DocumentId) -> Fut,
    Fut: Future<Output = VaultResult<T>>,
{
    let items: Vec<BatchItem<T>> = stream::iter(ids.iter().cloned())
        .map(|document_id| {
            let pending = op(document_id.clone());
            async move {
                let outcome = pending.await;
                if let Err(e) = &outcome {
                    warn!(
                        document_id = %document_id,
                        retryable = e.is_retryable(),
                        error = %e,
                        "Batch item failed"
                    );
                }
                BatchItem {
                    document_id,
                    outcome,
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    BatchReport { items }
}
