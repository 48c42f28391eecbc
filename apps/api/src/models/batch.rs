use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Batch lifecycle status. Transitions only forward:
/// created → running → completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum BatchStatus {
    Created,
    Running,
    Completed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Created => "created",
            BatchStatus::Running => "running",
            BatchStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item lifecycle status. An item moves queued → processing → {done | failed}
/// exactly once and never re-enters queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ItemStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Queued => "queued",
            ItemStatus::Processing => "processing",
            ItemStatus::Done => "done",
            ItemStatus::Failed => "failed",
        }
    }

    /// done and failed are terminal — no further transition occurs.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Done | ItemStatus::Failed)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BatchRow {
    pub id: Uuid,
    pub label: String,
    pub profile: Json<ApplicantProfile>,
    pub total: i32,
    pub processed: i32,
    pub failed: i32,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BatchItemRow {
    pub id: Uuid,
    pub batch_id: Uuid,
    /// Zero-based insertion order within the batch — the queue pickup order.
    pub position: i32,
    pub company: String,
    pub role: String,
    pub job_description: String,
    pub status: ItemStatus,
    pub ats_score: Option<i16>,
    pub assets: Option<Json<ItemAssets>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Batch-level counters returned by the atomic increment primitive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, FromRow)]
pub struct BatchCounters {
    pub processed: i32,
    pub failed: i32,
    pub total: i32,
}

/// Resume-profile snapshot captured on the batch at creation time.
/// Every item of the batch is drafted against this one profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub full_name: String,
    pub summary: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

/// One company/role target — the request-side shape of a batch item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTarget {
    pub company: String,
    pub role: String,
    pub job_description: String,
}

/// Result of processing one item: the ATS score plus the generated assets.
/// This is the typed payload the aggregator persists — all fields required,
/// so a malformed engine response fails at this boundary instead of landing
/// in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftOutcome {
    /// ATS compatibility score, 0–100.
    pub ats_score: u8,
    pub assets: ItemAssets,
}

/// Generated assets for one item: the documents plus the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemAssets {
    pub documents: Vec<GeneratedDocument>,
    pub events: Vec<TrackerEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedDocument {
    pub kind: DocumentKind,
    pub title: String,
    pub markdown: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Resume,
    CoverLetter,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Resume => "resume",
            DocumentKind::CoverLetter => "cover_letter",
        }
    }
}

/// One entry in an item's application-tracker event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerEvent {
    pub label: String,
    pub detail: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl TrackerEvent {
    pub fn new(label: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            label: label.into(),
            detail,
            occurred_at: Utc::now(),
        }
    }
}
