//! Settlement — records one item's terminal result, advances the batch
//! counters, and closes the batch when the last item lands.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::batch::processor::ProcessingFailure;
use crate::batch::store::{BatchStore, StoreError};
use crate::models::batch::{BatchCounters, DraftOutcome, ItemStatus};

/// What settling one item did to the batch.
#[derive(Debug, Clone, Copy)]
pub struct Settlement {
    pub item_status: ItemStatus,
    pub counters: BatchCounters,
    pub batch_completed: bool,
}

/// Applies item results to the store. Exactly one settlement happens per
/// item, and each settlement advances the batch counters exactly once.
pub struct BatchAggregator {
    store: Arc<dyn BatchStore>,
}

impl BatchAggregator {
    pub fn new(store: Arc<dyn BatchStore>) -> Self {
        Self { store }
    }

    /// Settles one item: records its terminal status, increments the batch
    /// counters, and marks the batch completed when `processed` reaches
    /// `total`.
    ///
    /// A store failure while recording the item downgrades the item to
    /// failed but still advances the counters, so the batch always reaches
    /// a terminal status. Only a failure of the counter update itself
    /// surfaces as an error.
    pub async fn on_item_settled(
        &self,
        batch_id: Uuid,
        item_id: Uuid,
        result: Result<DraftOutcome, ProcessingFailure>,
    ) -> Result<Settlement, StoreError> {
        let item_failed = match result {
            Ok(outcome) => self.settle_success(item_id, outcome).await,
            Err(failure) => {
                self.settle_failure(item_id, &failure.to_string()).await;
                true
            }
        };

        let counters = self.store.increment_counters(batch_id, item_failed).await?;
        info!(
            "Settled item {item_id} of batch {batch_id}: {} ({}/{} processed, {} failed)",
            if item_failed { "failed" } else { "done" },
            counters.processed,
            counters.total,
            counters.failed
        );

        let batch_completed = if counters.processed >= counters.total {
            let completed = self.store.mark_completed(batch_id).await?;
            if completed {
                info!(
                    "Batch {batch_id} completed: {} processed, {} failed",
                    counters.processed, counters.failed
                );
            }
            completed
        } else {
            false
        };

        Ok(Settlement {
            item_status: if item_failed {
                ItemStatus::Failed
            } else {
                ItemStatus::Done
            },
            counters,
            batch_completed,
        })
    }

    /// Persists a successful outcome. Returns whether the item ended up
    /// failed anyway (the result could not be written).
    async fn settle_success(&self, item_id: Uuid, outcome: DraftOutcome) -> bool {
        let score = i16::from(outcome.ats_score);
        match self
            .store
            .record_item_done(item_id, score, &outcome.assets)
            .await
        {
            Ok(true) => false,
            Ok(false) => {
                warn!("Item {item_id} was not in processing when its result arrived");
                true
            }
            Err(e) => {
                warn!("Could not persist result for item {item_id}: {e}");
                self.settle_failure(item_id, &format!("result could not be persisted: {e}"))
                    .await;
                true
            }
        }
    }

    /// Persists a failure message. Never propagates store errors: the
    /// counter increment that follows must run regardless.
    async fn settle_failure(&self, item_id: Uuid, message: &str) {
        match self.store.record_item_failed(item_id, message).await {
            Ok(true) => {}
            Ok(false) => {
                warn!("Item {item_id} was already terminal when its failure arrived");
            }
            Err(e) => {
                error!("Could not record failure for item {item_id}: {e}");
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
