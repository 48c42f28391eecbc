//! Batch runner — bounded-concurrency execution of a batch's queued items.
//!
//! Flow: mark the batch running → snapshot the queue → keep at most
//! `concurrency` drafting tasks in flight via a JoinSet, refilling from the
//! front of the queue as results land → settle every result through the
//! aggregator, which closes the batch after the last item.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{self, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::batch::aggregator::BatchAggregator;
use crate::batch::engine::ResumeEngine;
use crate::batch::processor::{ItemProcessor, ProcessingFailure};
use crate::batch::store::{BatchStore, StoreError};
use crate::models::batch::{BatchRow, BatchStatus, DraftOutcome};

pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 5;
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Options for one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub concurrency: usize,
}

impl RunOptions {
    /// Builds options from a client-requested concurrency. Out-of-range
    /// requests are clamped, never rejected; `None` uses the default.
    pub fn clamped(requested: Option<usize>) -> Self {
        let concurrency = requested
            .unwrap_or(DEFAULT_CONCURRENCY)
            .clamp(MIN_CONCURRENCY, MAX_CONCURRENCY);
        Self { concurrency }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Final counters of a finished (or skipped) run.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub batch_id: Uuid,
    pub processed: i32,
    pub failed: i32,
    pub total: i32,
    pub completed: bool,
}

impl RunSummary {
    fn from_batch(batch: &BatchRow) -> Self {
        Self {
            batch_id: batch.id,
            processed: batch.processed,
            failed: batch.failed,
            total: batch.total,
            completed: batch.status == BatchStatus::Completed,
        }
    }
}

/// Drives whole batches. One runner instance is shared by all requests;
/// each run owns its batch exclusively via the `mark_running` guard.
pub struct BatchRunner {
    store: Arc<dyn BatchStore>,
    processor: ItemProcessor,
    aggregator: BatchAggregator,
}

impl BatchRunner {
    pub fn new(
        store: Arc<dyn BatchStore>,
        engine: Arc<dyn ResumeEngine>,
        item_timeout: Duration,
    ) -> Self {
        Self {
            processor: ItemProcessor::new(engine, item_timeout),
            aggregator: BatchAggregator::new(store.clone()),
            store,
        }
    }

    /// Fire-and-forget entry point used by the run endpoint: spawns the run
    /// as a detached task and returns immediately. Dropping the returned
    /// handle does not cancel the run.
    pub fn spawn_detached(self: &Arc<Self>, batch_id: Uuid, options: RunOptions) -> JoinHandle<()> {
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = runner.run(batch_id, options).await {
                error!("Detached run of batch {batch_id} failed: {e}");
            }
        })
    }

    /// Runs a batch to its terminal status.
    ///
    /// The `mark_running` guard makes concurrent runs of the same batch
    /// harmless: exactly one caller wins the created → running transition,
    /// every other caller returns the current counters untouched.
    pub async fn run(
        &self,
        batch_id: Uuid,
        options: RunOptions,
    ) -> Result<RunSummary, StoreError> {
        if !self.store.mark_running(batch_id).await? {
            let batch = self.store.get_batch(batch_id).await?;
            warn!(
                "Batch {batch_id} not picked up: status is already {}",
                batch.status
            );
            return Ok(RunSummary::from_batch(&batch));
        }

        let batch = self.store.get_batch(batch_id).await?;
        let profile = batch.profile.0;
        let queue = self.store.queued_items(batch_id).await?;
        info!(
            "Running batch {batch_id}: {} queued items at concurrency {}",
            queue.len(),
            options.concurrency
        );

        let mut queue = queue.into_iter();
        let mut tasks: JoinSet<(Uuid, Result<DraftOutcome, ProcessingFailure>)> = JoinSet::new();
        let mut in_flight: HashMap<task::Id, Uuid> = HashMap::new();

        loop {
            // Refill up to the concurrency cap from the front of the queue.
            while tasks.len() < options.concurrency {
                let Some(item) = queue.next() else { break };
                match self.store.claim_item(item.id).await {
                    Ok(true) => {
                        let processor = self.processor.clone();
                        let profile = profile.clone();
                        let item_id = item.id;
                        let handle = tasks.spawn(async move {
                            let result = processor.process(&profile, &item).await;
                            (item_id, result)
                        });
                        in_flight.insert(handle.id(), item_id);
                    }
                    Ok(false) => {
                        debug!("Item {} is no longer queued; skipping", item.id);
                    }
                    Err(e) => {
                        warn!("Could not claim item {}: {e}", item.id);
                        let failure = ProcessingFailure::TaskAborted(format!(
                            "item could not be claimed: {e}"
                        ));
                        self.settle(batch_id, item.id, Err(failure)).await;
                    }
                }
            }

            // Queue drained and nothing in flight: the run is over.
            let Some(joined) = tasks.join_next_with_id().await else {
                break;
            };

            match joined {
                Ok((task_id, (item_id, result))) => {
                    in_flight.remove(&task_id);
                    self.settle(batch_id, item_id, result).await;
                }
                Err(join_error) => {
                    // A panicked or cancelled drafting task still settles its item.
                    let task_id = join_error.id();
                    match in_flight.remove(&task_id) {
                        Some(item_id) => {
                            let failure =
                                ProcessingFailure::TaskAborted(join_error.to_string());
                            self.settle(batch_id, item_id, Err(failure)).await;
                        }
                        None => error!("Join error for unknown drafting task: {join_error}"),
                    }
                }
            }
        }

        let batch = self.store.get_batch(batch_id).await?;
        info!(
            "Batch {batch_id} run finished: {}/{} processed, {} failed",
            batch.processed, batch.total, batch.failed
        );
        Ok(RunSummary::from_batch(&batch))
    }

    async fn settle(
        &self,
        batch_id: Uuid,
        item_id: Uuid,
        result: Result<DraftOutcome, ProcessingFailure>,
    ) {
        if let Err(e) = self
            .aggregator
            .on_item_settled(batch_id, item_id, result)
            .await
        {
            error!("Failed to settle item {item_id} of batch {batch_id}: {e}");
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
