//! Axum route handlers for the Batch API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::batch::runner::RunOptions;
use crate::errors::AppError;
use crate::models::batch::{
    ApplicantProfile, BatchItemRow, BatchRow, BatchStatus, ItemStatus, JobTarget,
};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBatchRequest {
    pub label: String,
    pub profile: ApplicantProfile,
    /// Targets may also be appended later via the items endpoint.
    #[serde(default)]
    pub targets: Vec<JobTarget>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub batch: BatchRow,
    pub items: Vec<BatchItemRow>,
}

#[derive(Debug, Deserialize)]
pub struct AddItemsRequest {
    pub targets: Vec<JobTarget>,
}

#[derive(Debug, Deserialize)]
pub struct RunQuery {
    pub concurrency: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RunBatchResponse {
    pub batch_id: Uuid,
    /// Always true in a success response — failure to start is an error.
    pub started: bool,
    pub concurrency: usize,
}

/// Per-status item counts for one batch.
#[derive(Debug, Default, Serialize)]
pub struct StatusTally {
    pub queued: usize,
    pub processing: usize,
    pub done: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize)]
pub struct BatchDetailResponse {
    pub batch: BatchRow,
    pub tally: StatusTally,
    pub items: Vec<BatchItemRow>,
}

#[derive(Debug, Serialize)]
pub struct BatchListResponse {
    pub batches: Vec<BatchRow>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/batches
///
/// Creates a batch in `created` status from an applicant profile, optionally
/// seeding it with initial job targets.
pub async fn handle_create_batch(
    State(state): State<AppState>,
    Json(request): Json<CreateBatchRequest>,
) -> Result<(StatusCode, Json<BatchResponse>), AppError> {
    require_field(&request.label, "label")?;
    validate_profile(&request.profile)?;
    validate_targets(&request.targets)?;

    let batch = state
        .store
        .create_batch(request.label.trim(), &request.profile)
        .await?;
    let items = if request.targets.is_empty() {
        Vec::new()
    } else {
        state.store.add_items(batch.id, &request.targets).await?
    };

    // Re-read so the response carries the post-append total.
    let batch = state.store.get_batch(batch.id).await?;
    Ok((StatusCode::CREATED, Json(BatchResponse { batch, items })))
}

/// POST /api/v1/batches/:id/items
///
/// Appends job targets to a batch that has not started running yet.
pub async fn handle_add_items(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Json(request): Json<AddItemsRequest>,
) -> Result<Json<BatchResponse>, AppError> {
    if request.targets.is_empty() {
        return Err(AppError::Validation("targets cannot be empty".to_string()));
    }
    validate_targets(&request.targets)?;

    let items = state.store.add_items(batch_id, &request.targets).await?;
    let batch = state.store.get_batch(batch_id).await?;
    Ok(Json(BatchResponse { batch, items }))
}

/// POST /api/v1/batches/:id/run?concurrency=N
///
/// Kicks off processing as a detached task and responds immediately with
/// 202. Out-of-range concurrency values are clamped, not rejected.
pub async fn handle_run_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Query(query): Query<RunQuery>,
) -> Result<(StatusCode, Json<RunBatchResponse>), AppError> {
    let batch = state.store.get_batch(batch_id).await?;
    if batch.status != BatchStatus::Created {
        return Err(AppError::InvalidState(format!(
            "batch {batch_id} is {}; only created batches can be run",
            batch.status
        )));
    }
    if batch.total == 0 {
        return Err(AppError::EmptyBatch(
            "batch has no items to process".to_string(),
        ));
    }

    let requested = query.concurrency.or(Some(state.config.batch_concurrency));
    let options = RunOptions::clamped(requested);
    state.runner.spawn_detached(batch_id, options);
    info!(
        "Accepted run of batch {batch_id} at concurrency {}",
        options.concurrency
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(RunBatchResponse {
            batch_id,
            started: true,
            concurrency: options.concurrency,
        }),
    ))
}

/// GET /api/v1/batches/:id
///
/// Returns the batch row, a per-status tally, and every item in queue order.
pub async fn handle_get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<BatchDetailResponse>, AppError> {
    let batch = state.store.get_batch(batch_id).await?;
    let items = state.store.items_for_batch(batch_id).await?;
    let tally = tally_items(&items);
    Ok(Json(BatchDetailResponse {
        batch,
        tally,
        items,
    }))
}

/// GET /api/v1/batches/:id/items/:item_id
///
/// Returns one item, including its assets and error detail once settled.
pub async fn handle_get_item(
    State(state): State<AppState>,
    Path((batch_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<BatchItemRow>, AppError> {
    let item = state.store.get_item(item_id).await?;
    if item.batch_id != batch_id {
        return Err(AppError::NotFound(format!(
            "item {item_id} does not belong to batch {batch_id}"
        )));
    }
    Ok(Json(item))
}

/// GET /api/v1/batches
///
/// Lists all batches, newest first.
pub async fn handle_list_batches(
    State(state): State<AppState>,
) -> Result<Json<BatchListResponse>, AppError> {
    let batches = state.store.list_batches().await?;
    Ok(Json(BatchListResponse { batches }))
}

// ────────────────────────────────────────────────────────────────────────────
// Validation
// ────────────────────────────────────────────────────────────────────────────

fn require_field(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

fn validate_profile(profile: &ApplicantProfile) -> Result<(), AppError> {
    require_field(&profile.full_name, "profile.full_name")?;
    require_field(&profile.summary, "profile.summary")
}

fn validate_targets(targets: &[JobTarget]) -> Result<(), AppError> {
    for (index, target) in targets.iter().enumerate() {
        require_field(&target.company, &format!("targets[{index}].company"))?;
        require_field(&target.role, &format!("targets[{index}].role"))?;
        require_field(
            &target.job_description,
            &format!("targets[{index}].job_description"),
        )?;
    }
    Ok(())
}

fn tally_items(items: &[BatchItemRow]) -> StatusTally {
    let mut tally = StatusTally::default();
    for item in items {
        match item.status {
            ItemStatus::Queued => tally.queued += 1,
            ItemStatus::Processing => tally.processing += 1,
            ItemStatus::Done => tally.done += 1,
            ItemStatus::Failed => tally.failed += 1,
        }
    }
    tally
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
