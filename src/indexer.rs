use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::classify::classify;
use crate::embedder::ModalityEmbedder;
use crate::error::{IndexError, Result};
use crate::models::{BatchOutcome, FileDescriptor, IndexRecord};
use crate::store::IndexStore;

/// Drives files through classification, embedding and storage.
pub struct Indexer {
    embedder: Arc<ModalityEmbedder>,
    store: Arc<dyn IndexStore>,
}

impl Indexer {
    pub fn new(embedder: Arc<ModalityEmbedder>, store: Arc<dyn IndexStore>) -> Self {
        Self { embedder, store }
    }

    /// Indexes one file. Nothing is stored unless every step succeeds.
    pub async fn index_one(&self, descriptor: &FileDescriptor) -> Result<IndexRecord> {
        let modality = classify(descriptor).ok_or_else(|| {
            IndexError::UnsupportedType(
                descriptor
                    .declared_type
                    .clone()
                    .unwrap_or_else(|| descriptor.name.clone()),
            )
        })?;

        let embedding = self.embedder.embed(descriptor, modality).await?;
        let record = IndexRecord::new(descriptor.locator.clone(), modality, embedding);
        let stored = self.store.upsert(record).await?;

        info!("Indexed {} as {} ({})", stored.path, stored.modality, stored.id);
        Ok(stored)
    }

    /// Indexes files one at a time. A failing file is recorded and the batch
    /// moves on; `progress` gets `(processed, total)` after every file.
    pub async fn index_batch(
        &self,
        descriptors: &[FileDescriptor],
        progress: &mut dyn FnMut(usize, usize),
    ) -> Vec<BatchOutcome> {
        let total = descriptors.len();
        let mut outcomes = Vec::with_capacity(total);

        for descriptor in descriptors {
            let result = self.index_one(descriptor).await;
            outcomes.push(to_outcome(descriptor, result));
            progress(outcomes.len(), total);
        }

        log_summary(&outcomes);
        outcomes
    }

    /// Like [`Self::index_batch`] but keeps up to `workers` files in flight.
    /// Outcomes and progress still follow input order.
    pub async fn index_batch_concurrent(
        &self,
        descriptors: &[FileDescriptor],
        workers: usize,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Vec<BatchOutcome> {
        let total = descriptors.len();
        let mut outcomes = Vec::with_capacity(total);

        let mut in_flight = stream::iter(descriptors)
            .map(|descriptor| async move { (descriptor, self.index_one(descriptor).await) })
            .buffered(workers.max(1));

        while let Some((descriptor, result)) = in_flight.next().await {
            outcomes.push(to_outcome(descriptor, result));
            progress(outcomes.len(), total);
        }

        log_summary(&outcomes);
        outcomes
    }
}

fn to_outcome(descriptor: &FileDescriptor, result: Result<IndexRecord>) -> BatchOutcome {
    match result {
        Ok(record) => BatchOutcome::Success(record),
        Err(error) => {
            warn!(
                "Failed to index {} ({}): {}",
                descriptor.locator,
                error.component(),
                error
            );
            BatchOutcome::Failure {
                locator: descriptor.locator.clone(),
                error,
            }
        }
    }
}

fn log_summary(outcomes: &[BatchOutcome]) {
    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    info!(
        "Batch finished: {} indexed, {} failed",
        succeeded,
        outcomes.len() - succeeded
    );
}
