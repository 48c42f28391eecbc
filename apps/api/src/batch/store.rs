//! Durable store for batches and their items.
//!
//! Status writes are conditional UPDATEs guarded on the current status, and
//! counter updates are single-statement increments with RETURNING. Statuses
//! only move forward; counters never miss a settled item.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::batch::{
    ApplicantProfile, BatchCounters, BatchItemRow, BatchRow, BatchStatus, ItemAssets, JobTarget,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("batch or item not found")]
    NotFound,

    #[error("operation not allowed in the current batch status")]
    InvalidTransition,
}

/// Persistence seam for the batch pipeline.
/// Production uses `PgBatchStore`; tests swap in an in-memory double.
#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Inserts a new batch in `created` status with zeroed counters.
    async fn create_batch(
        &self,
        label: &str,
        profile: &ApplicantProfile,
    ) -> Result<BatchRow, StoreError>;

    /// Appends items to a batch and bumps its `total`, in one transaction.
    /// Fails with `InvalidTransition` unless the batch is still `created`.
    async fn add_items(
        &self,
        batch_id: Uuid,
        targets: &[JobTarget],
    ) -> Result<Vec<BatchItemRow>, StoreError>;

    async fn get_batch(&self, batch_id: Uuid) -> Result<BatchRow, StoreError>;

    async fn list_batches(&self) -> Result<Vec<BatchRow>, StoreError>;

    async fn get_item(&self, item_id: Uuid) -> Result<BatchItemRow, StoreError>;

    /// All items of a batch in queue order.
    async fn items_for_batch(&self, batch_id: Uuid) -> Result<Vec<BatchItemRow>, StoreError>;

    /// Still-queued items of a batch in queue order.
    async fn queued_items(&self, batch_id: Uuid) -> Result<Vec<BatchItemRow>, StoreError>;

    /// created → running. Returns `false` when the batch was not in `created`.
    async fn mark_running(&self, batch_id: Uuid) -> Result<bool, StoreError>;

    /// queued → processing. Returns `false` when the item was not in `queued`.
    async fn claim_item(&self, item_id: Uuid) -> Result<bool, StoreError>;

    /// processing → done, recording the score and assets.
    /// Returns `false` when the item was not in `processing`.
    async fn record_item_done(
        &self,
        item_id: Uuid,
        ats_score: i16,
        assets: &ItemAssets,
    ) -> Result<bool, StoreError>;

    /// queued or processing → failed, recording the failure message. The
    /// queued case covers items whose claim itself failed at the store, so
    /// every counted item reaches a terminal state.
    /// Returns `false` when the item was already terminal.
    async fn record_item_failed(&self, item_id: Uuid, error: &str) -> Result<bool, StoreError>;

    /// Atomically advances `processed` (and `failed` when the item failed),
    /// returning the batch counters after the increment.
    async fn increment_counters(
        &self,
        batch_id: Uuid,
        item_failed: bool,
    ) -> Result<BatchCounters, StoreError>;

    /// running → completed, guarded on `processed = total`.
    /// Returns `false` when the guard did not match.
    async fn mark_completed(&self, batch_id: Uuid) -> Result<bool, StoreError>;

    /// Cheap connectivity probe for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL implementation
// ────────────────────────────────────────────────────────────────────────────

pub struct PgBatchStore {
    pool: PgPool,
}

impl PgBatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BatchStore for PgBatchStore {
    async fn create_batch(
        &self,
        label: &str,
        profile: &ApplicantProfile,
    ) -> Result<BatchRow, StoreError> {
        let batch_id = Uuid::new_v4();
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            INSERT INTO batches (id, label, profile)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(batch_id)
        .bind(label)
        .bind(Json(profile))
        .fetch_one(&self.pool)
        .await?;

        info!("Created batch {batch_id} ({label})");
        Ok(row)
    }

    async fn add_items(
        &self,
        batch_id: Uuid,
        targets: &[JobTarget],
    ) -> Result<Vec<BatchItemRow>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Lock the batch row so concurrent adds serialize on the position counter.
        let status: Option<BatchStatus> =
            sqlx::query_scalar("SELECT status FROM batches WHERE id = $1 FOR UPDATE")
                .bind(batch_id)
                .fetch_optional(&mut *tx)
                .await?;
        match status {
            None => return Err(StoreError::NotFound),
            Some(BatchStatus::Created) => {}
            Some(_) => return Err(StoreError::InvalidTransition),
        }

        let next_position: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM batch_items WHERE batch_id = $1",
        )
        .bind(batch_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut rows = Vec::with_capacity(targets.len());
        for (offset, target) in targets.iter().enumerate() {
            let row = sqlx::query_as::<_, BatchItemRow>(
                r#"
                INSERT INTO batch_items (id, batch_id, position, company, role, job_description)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(batch_id)
            .bind(next_position + offset as i32)
            .bind(&target.company)
            .bind(&target.role)
            .bind(&target.job_description)
            .fetch_one(&mut *tx)
            .await?;
            rows.push(row);
        }

        sqlx::query("UPDATE batches SET total = total + $2, updated_at = now() WHERE id = $1")
            .bind(batch_id)
            .bind(targets.len() as i32)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("Added {} items to batch {batch_id}", targets.len());
        Ok(rows)
    }

    async fn get_batch(&self, batch_id: Uuid) -> Result<BatchRow, StoreError> {
        sqlx::query_as::<_, BatchRow>("SELECT * FROM batches WHERE id = $1")
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn list_batches(&self) -> Result<Vec<BatchRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, BatchRow>("SELECT * FROM batches ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_item(&self, item_id: Uuid) -> Result<BatchItemRow, StoreError> {
        sqlx::query_as::<_, BatchItemRow>("SELECT * FROM batch_items WHERE id = $1")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn items_for_batch(&self, batch_id: Uuid) -> Result<Vec<BatchItemRow>, StoreError> {
        Ok(sqlx::query_as::<_, BatchItemRow>(
            "SELECT * FROM batch_items WHERE batch_id = $1 ORDER BY position",
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn queued_items(&self, batch_id: Uuid) -> Result<Vec<BatchItemRow>, StoreError> {
        Ok(sqlx::query_as::<_, BatchItemRow>(
            "SELECT * FROM batch_items WHERE batch_id = $1 AND status = 'queued' ORDER BY position",
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn mark_running(&self, batch_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE batches
            SET status = 'running', updated_at = now()
            WHERE id = $1 AND status = 'created'
            "#,
        )
        .bind(batch_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn claim_item(&self, item_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE batch_items
            SET status = 'processing', updated_at = now()
            WHERE id = $1 AND status = 'queued'
            "#,
        )
        .bind(item_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_item_done(
        &self,
        item_id: Uuid,
        ats_score: i16,
        assets: &ItemAssets,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE batch_items
            SET status = 'done', ats_score = $2, assets = $3, error = NULL, updated_at = now()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(item_id)
        .bind(ats_score)
        .bind(Json(assets))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_item_failed(&self, item_id: Uuid, error: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE batch_items
            SET status = 'failed', error = $2, updated_at = now()
            WHERE id = $1 AND status IN ('queued', 'processing')
            "#,
        )
        .bind(item_id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn increment_counters(
        &self,
        batch_id: Uuid,
        item_failed: bool,
    ) -> Result<BatchCounters, StoreError> {
        sqlx::query_as::<_, BatchCounters>(
            r#"
            UPDATE batches
            SET processed = processed + 1,
                failed = failed + CASE WHEN $2 THEN 1 ELSE 0 END,
                updated_at = now()
            WHERE id = $1
            RETURNING processed, failed, total
            "#,
        )
        .bind(batch_id)
        .bind(item_failed)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn mark_completed(&self, batch_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE batches
            SET status = 'completed', updated_at = now()
            WHERE id = $1 AND status = 'running' AND processed = total
            "#,
        )
        .bind(batch_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
