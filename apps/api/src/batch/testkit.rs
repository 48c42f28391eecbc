//! Test doubles for the batch pipeline: an in-memory store that mirrors the
//! SQL transition guards, a stubbed drafting engine with injectable latency
//! and failures, and seed helpers shared across the pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::batch::engine::{EngineError, ResumeEngine};
use crate::batch::store::{BatchStore, StoreError};
use crate::config::Config;
use crate::models::batch::{
    ApplicantProfile, BatchCounters, BatchItemRow, BatchRow, BatchStatus, DocumentKind,
    DraftOutcome, GeneratedDocument, ItemAssets, ItemStatus, JobTarget, TrackerEvent,
};

// ────────────────────────────────────────────────────────────────────────────
// In-memory store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct StoreState {
    batches: HashMap<Uuid, BatchRow>,
    items: HashMap<Uuid, BatchItemRow>,
}

/// Mirrors `PgBatchStore` semantics: the same conditional guards return the
/// same booleans, and counter writes panic if they would break the
/// `failed <= processed <= total` invariant the table's CHECK enforces.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    fail_next_done: AtomicBool,
    fail_next_claim: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `record_item_done` call fail with a database error.
    pub fn fail_next_done_write(&self) {
        self.fail_next_done.store(true, Ordering::SeqCst);
    }

    /// Makes the next `claim_item` call fail with a database error.
    pub fn fail_next_claim_write(&self) {
        self.fail_next_claim.store(true, Ordering::SeqCst);
    }

    /// Test accessor: the current row for an item. Panics when unknown.
    pub async fn item(&self, item_id: Uuid) -> BatchItemRow {
        self.state
            .lock()
            .await
            .items
            .get(&item_id)
            .cloned()
            .expect("item not seeded")
    }
}

fn assert_counters(batch: &BatchRow) {
    assert!(
        batch.failed >= 0 && batch.failed <= batch.processed && batch.processed <= batch.total,
        "counter invariant violated for batch {}: failed={} processed={} total={}",
        batch.id,
        batch.failed,
        batch.processed,
        batch.total
    );
}

#[async_trait]
impl BatchStore for InMemoryStore {
    async fn create_batch(
        &self,
        label: &str,
        profile: &ApplicantProfile,
    ) -> Result<BatchRow, StoreError> {
        let now = Utc::now();
        let row = BatchRow {
            id: Uuid::new_v4(),
            label: label.to_string(),
            profile: Json(profile.clone()),
            total: 0,
            processed: 0,
            failed: 0,
            status: BatchStatus::Created,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.batches.insert(row.id, row.clone());
        Ok(row)
    }

    async fn add_items(
        &self,
        batch_id: Uuid,
        targets: &[JobTarget],
    ) -> Result<Vec<BatchItemRow>, StoreError> {
        let mut state = self.state.lock().await;

        let batch = state.batches.get(&batch_id).ok_or(StoreError::NotFound)?;
        if batch.status != BatchStatus::Created {
            return Err(StoreError::InvalidTransition);
        }

        let next_position = state
            .items
            .values()
            .filter(|i| i.batch_id == batch_id)
            .map(|i| i.position)
            .max()
            .map_or(0, |p| p + 1);

        let now = Utc::now();
        let mut rows = Vec::with_capacity(targets.len());
        for (offset, target) in targets.iter().enumerate() {
            let row = BatchItemRow {
                id: Uuid::new_v4(),
                batch_id,
                position: next_position + offset as i32,
                company: target.company.clone(),
                role: target.role.clone(),
                job_description: target.job_description.clone(),
                status: ItemStatus::Queued,
                ats_score: None,
                assets: None,
                error: None,
                created_at: now,
                updated_at: now,
            };
            state.items.insert(row.id, row.clone());
            rows.push(row);
        }

        let batch = state
            .batches
            .get_mut(&batch_id)
            .ok_or(StoreError::NotFound)?;
        batch.total += targets.len() as i32;
        batch.updated_at = now;

        Ok(rows)
    }

    async fn get_batch(&self, batch_id: Uuid) -> Result<BatchRow, StoreError> {
        self.state
            .lock()
            .await
            .batches
            .get(&batch_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_batches(&self) -> Result<Vec<BatchRow>, StoreError> {
        let state = self.state.lock().await;
        let mut batches: Vec<BatchRow> = state.batches.values().cloned().collect();
        batches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(batches)
    }

    async fn get_item(&self, item_id: Uuid) -> Result<BatchItemRow, StoreError> {
        self.state
            .lock()
            .await
            .items
            .get(&item_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn items_for_batch(&self, batch_id: Uuid) -> Result<Vec<BatchItemRow>, StoreError> {
        let state = self.state.lock().await;
        let mut items: Vec<BatchItemRow> = state
            .items
            .values()
            .filter(|i| i.batch_id == batch_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.position);
        Ok(items)
    }

    async fn queued_items(&self, batch_id: Uuid) -> Result<Vec<BatchItemRow>, StoreError> {
        let mut items = self.items_for_batch(batch_id).await?;
        items.retain(|i| i.status == ItemStatus::Queued);
        Ok(items)
    }

    async fn mark_running(&self, batch_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.batches.get_mut(&batch_id) {
            Some(batch) if batch.status == BatchStatus::Created => {
                batch.status = BatchStatus::Running;
                batch.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn claim_item(&self, item_id: Uuid) -> Result<bool, StoreError> {
        if self.fail_next_claim.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        let mut state = self.state.lock().await;
        match state.items.get_mut(&item_id) {
            Some(item) if item.status == ItemStatus::Queued => {
                item.status = ItemStatus::Processing;
                item.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_item_done(
        &self,
        item_id: Uuid,
        ats_score: i16,
        assets: &ItemAssets,
    ) -> Result<bool, StoreError> {
        if self.fail_next_done.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        assert!(
            (0..=100).contains(&ats_score),
            "ats_score {ats_score} outside 0..=100"
        );

        let mut state = self.state.lock().await;
        match state.items.get_mut(&item_id) {
            Some(item) if item.status == ItemStatus::Processing => {
                item.status = ItemStatus::Done;
                item.ats_score = Some(ats_score);
                item.assets = Some(Json(assets.clone()));
                item.error = None;
                item.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_item_failed(&self, item_id: Uuid, error: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.items.get_mut(&item_id) {
            Some(item) if !item.status.is_terminal() => {
                item.status = ItemStatus::Failed;
                item.error = Some(error.to_string());
                item.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_counters(
        &self,
        batch_id: Uuid,
        item_failed: bool,
    ) -> Result<BatchCounters, StoreError> {
        let mut state = self.state.lock().await;
        let batch = state
            .batches
            .get_mut(&batch_id)
            .ok_or(StoreError::NotFound)?;
        batch.processed += 1;
        if item_failed {
            batch.failed += 1;
        }
        batch.updated_at = Utc::now();
        assert_counters(batch);
        Ok(BatchCounters {
            processed: batch.processed,
            failed: batch.failed,
            total: batch.total,
        })
    }

    async fn mark_completed(&self, batch_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.batches.get_mut(&batch_id) {
            Some(batch)
                if batch.status == BatchStatus::Running && batch.processed == batch.total =>
            {
                batch.status = BatchStatus::Completed;
                batch.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stub engine
// ────────────────────────────────────────────────────────────────────────────

/// Drafting engine double: configurable latency, per-company failures, and
/// gauges for pickup order and peak concurrency.
pub struct StubEngine {
    latency: Duration,
    fail_companies: HashSet<String>,
    picked_up: StdMutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubEngine {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            fail_companies: HashSet::new(),
            picked_up: StdMutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Marks a company whose drafts will fail.
    pub fn failing_for(mut self, company: &str) -> Self {
        self.fail_companies.insert(company.to_string());
        self
    }

    /// Companies in the order the engine received them.
    pub fn pickup_order(&self) -> Vec<String> {
        self.picked_up.lock().unwrap().clone()
    }

    /// Highest number of drafts that were ever in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResumeEngine for StubEngine {
    async fn draft(
        &self,
        profile: &ApplicantProfile,
        target: &JobTarget,
    ) -> Result<DraftOutcome, EngineError> {
        self.picked_up.lock().unwrap().push(target.company.clone());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        tokio::time::sleep(self.latency).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_companies.contains(&target.company) {
            return Err(EngineError::InvalidOutput(format!(
                "stubbed failure for {}",
                target.company
            )));
        }

        Ok(DraftOutcome {
            ats_score: 82,
            assets: ItemAssets {
                documents: vec![
                    GeneratedDocument {
                        kind: DocumentKind::Resume,
                        title: format!("Resume for {} at {}", target.role, target.company),
                        markdown: format!("# {}\n\n{}", profile.full_name, profile.summary),
                    },
                    GeneratedDocument {
                        kind: DocumentKind::CoverLetter,
                        title: format!("Cover letter for {} at {}", target.role, target.company),
                        markdown: format!("Dear {} team,", target.company),
                    },
                ],
                events: vec![TrackerEvent::new("drafted", None)],
            },
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Seed helpers
// ────────────────────────────────────────────────────────────────────────────

/// Config double with test-friendly defaults; never touches the environment.
pub fn make_config() -> Config {
    Config {
        database_url: "postgres://localhost/pathway_test".to_string(),
        anthropic_api_key: "test-key".to_string(),
        port: 8080,
        rust_log: "info".to_string(),
        batch_concurrency: 2,
        item_timeout_secs: 45,
        llm_timeout_secs: 30,
    }
}

pub fn make_profile() -> ApplicantProfile {
    ApplicantProfile {
        full_name: "Jane Doe".to_string(),
        summary: "Computer science senior focused on backend systems.".to_string(),
        skills: vec!["Rust".to_string(), "SQL".to_string(), "Docker".to_string()],
        highlights: vec![
            "Built a campus ride-sharing service used by 2,000 students".to_string()
        ],
    }
}

pub fn make_target(company: &str, role: &str) -> JobTarget {
    JobTarget {
        company: company.to_string(),
        role: role.to_string(),
        job_description: format!(
            "We are hiring a {role}. You will build services in Rust and SQL at {company}."
        ),
    }
}

/// A queued item row that exists only in memory, for processor-level tests.
pub fn make_item(company: &str, role: &str) -> BatchItemRow {
    let target = make_target(company, role);
    let now = Utc::now();
    BatchItemRow {
        id: Uuid::new_v4(),
        batch_id: Uuid::new_v4(),
        position: 0,
        company: target.company,
        role: target.role,
        job_description: target.job_description,
        status: ItemStatus::Queued,
        ats_score: None,
        assets: None,
        error: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn make_outcome(ats_score: u8) -> DraftOutcome {
    DraftOutcome {
        ats_score,
        assets: ItemAssets {
            documents: vec![GeneratedDocument {
                kind: DocumentKind::Resume,
                title: "Resume".to_string(),
                markdown: "# Jane Doe".to_string(),
            }],
            events: vec![TrackerEvent::new("drafted", None)],
        },
    }
}

/// Creates a batch with `n` queued items, companies named "Company 01" on
/// up, and returns the batch id plus item ids in queue order.
pub async fn seed_batch(store: &InMemoryStore, n: usize) -> (Uuid, Vec<Uuid>) {
    let batch = store
        .create_batch("Summer 2026 internships", &make_profile())
        .await
        .expect("create batch");
    let targets: Vec<JobTarget> = (1..=n)
        .map(|i| make_target(&format!("Company {i:02}"), "Backend Intern"))
        .collect();
    let items = store.add_items(batch.id, &targets).await.expect("add items");
    (batch.id, items.iter().map(|i| i.id).collect())
}

/// Like `seed_batch`, but the batch is already running and every item is
/// claimed, ready for settlement-level tests.
pub async fn seed_claimed_batch(store: &InMemoryStore, n: usize) -> (Uuid, Vec<Uuid>) {
    let (batch_id, item_ids) = seed_batch(store, n).await;
    assert!(store.mark_running(batch_id).await.expect("mark running"));
    for item_id in &item_ids {
        assert!(store.claim_item(*item_id).await.expect("claim item"));
    }
    (batch_id, item_ids)
}
