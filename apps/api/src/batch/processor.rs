//! Item processor — drives one claimed batch item through the drafting
//! engine under a per-item deadline.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::batch::engine::{EngineError, ResumeEngine};
use crate::models::batch::{ApplicantProfile, BatchItemRow, DraftOutcome, JobTarget};

/// Terminal failure of one item. Item failures never abort the batch —
/// the runner settles them and moves on.
#[derive(Debug, Error)]
pub enum ProcessingFailure {
    #[error("drafting engine failed: {0}")]
    Engine(#[from] EngineError),

    #[error("processing timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("processing task aborted: {0}")]
    TaskAborted(String),
}

/// Processes one item at a time. Stateless apart from its engine handle,
/// so the runner can clone it into each drafting task.
#[derive(Clone)]
pub struct ItemProcessor {
    engine: Arc<dyn ResumeEngine>,
    item_timeout: Duration,
}

impl ItemProcessor {
    pub fn new(engine: Arc<dyn ResumeEngine>, item_timeout: Duration) -> Self {
        Self {
            engine,
            item_timeout,
        }
    }

    /// Runs the engine for one item, bounded by the per-item deadline.
    /// The caller has already claimed the item; this never touches the store.
    pub async fn process(
        &self,
        profile: &ApplicantProfile,
        item: &BatchItemRow,
    ) -> Result<DraftOutcome, ProcessingFailure> {
        debug!(
            "Processing item {} ({} / {})",
            item.id, item.company, item.role
        );

        let target = JobTarget {
            company: item.company.clone(),
            role: item.role.clone(),
            job_description: item.job_description.clone(),
        };

        match tokio::time::timeout(self.item_timeout, self.engine.draft(profile, &target)).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(ProcessingFailure::Engine(e)),
            Err(_) => Err(ProcessingFailure::TimedOut(self.item_timeout)),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
