//! Drafting engine — turns one job target plus the batch's applicant profile
//! into tailored documents and an ATS score.
//!
//! Flow: build draft prompt → LLM draft call → validate documents →
//!       LLM score call → validate score → DraftOutcome.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::batch::prompts::{
    ATS_SCORE_PROMPT_TEMPLATE, ATS_SCORE_SYSTEM, DRAFT_PROMPT_TEMPLATE, DRAFT_SYSTEM,
};
use crate::llm_client::prompts::PROFILE_GROUNDING_INSTRUCTION;
use crate::llm_client::{LlmClient, LlmError};
use crate::models::batch::{
    ApplicantProfile, DocumentKind, DraftOutcome, GeneratedDocument, ItemAssets, JobTarget,
    TrackerEvent,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("engine returned invalid output: {0}")]
    InvalidOutput(String),

    #[error("failed to build prompt: {0}")]
    Prompt(#[from] serde_json::Error),
}

/// Seam between the item processor and the LLM.
/// Production uses `LlmResumeEngine`; tests swap in a stub.
#[async_trait]
pub trait ResumeEngine: Send + Sync {
    /// Drafts documents for one target and scores the resume.
    /// Pure computation over its inputs — never touches the store.
    async fn draft(
        &self,
        profile: &ApplicantProfile,
        target: &JobTarget,
    ) -> Result<DraftOutcome, EngineError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LLM payloads
// ────────────────────────────────────────────────────────────────────────────

/// Shape of the drafting LLM response.
///
/// CRITICAL: strictly typed — a document missing `kind`, `title`, or
/// `markdown` fails deserialization instead of reaching the store.
#[derive(Debug, Deserialize)]
struct DraftPayload {
    documents: Vec<GeneratedDocument>,
}

/// Shape of the ATS scoring LLM response.
#[derive(Debug, Deserialize)]
struct AtsPayload {
    ats_score: u8,
    #[serde(default)]
    missing_keywords: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// LLM-backed engine
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmResumeEngine {
    llm: LlmClient,
}

impl LlmResumeEngine {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl ResumeEngine for LlmResumeEngine {
    async fn draft(
        &self,
        profile: &ApplicantProfile,
        target: &JobTarget,
    ) -> Result<DraftOutcome, EngineError> {
        debug!("Drafting documents for {} / {}", target.company, target.role);

        let draft_prompt = build_draft_prompt(profile, target)?;
        let payload: DraftPayload = self.llm.call_json(&draft_prompt, DRAFT_SYSTEM).await?;
        let resume = validate_documents(&payload.documents)?;

        let score_prompt = build_ats_prompt(&resume.markdown, target);
        let ats: AtsPayload = self.llm.call_json(&score_prompt, ATS_SCORE_SYSTEM).await?;
        if ats.ats_score > 100 {
            return Err(EngineError::InvalidOutput(format!(
                "ats_score {} out of range (0-100)",
                ats.ats_score
            )));
        }

        let mut events = vec![TrackerEvent::new(
            "drafted",
            Some(format!("{} documents generated", payload.documents.len())),
        )];
        let scored_detail = if ats.missing_keywords.is_empty() {
            format!("ATS score {}", ats.ats_score)
        } else {
            format!(
                "ATS score {}; missing keywords: {}",
                ats.ats_score,
                ats.missing_keywords.join(", ")
            )
        };
        events.push(TrackerEvent::new("scored", Some(scored_detail)));

        info!(
            "Drafted {} / {}: {} documents, ATS {}",
            target.company,
            target.role,
            payload.documents.len(),
            ats.ats_score
        );

        Ok(DraftOutcome {
            ats_score: ats.ats_score,
            assets: ItemAssets {
                documents: payload.documents,
                events,
            },
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Validation and prompt assembly
// ────────────────────────────────────────────────────────────────────────────

/// Checks the drafted document set and returns the resume document.
/// Rules: non-empty set, no blank markdown bodies, at least one resume.
fn validate_documents(documents: &[GeneratedDocument]) -> Result<&GeneratedDocument, EngineError> {
    if documents.is_empty() {
        return Err(EngineError::InvalidOutput(
            "drafting returned no documents".to_string(),
        ));
    }
    for document in documents {
        if document.markdown.trim().is_empty() {
            return Err(EngineError::InvalidOutput(format!(
                "document '{}' has an empty body",
                document.title
            )));
        }
    }
    documents
        .iter()
        .find(|d| d.kind == DocumentKind::Resume)
        .ok_or_else(|| {
            EngineError::InvalidOutput("drafting returned no resume document".to_string())
        })
}

/// Builds the drafting prompt by filling the template with the serialized profile.
fn build_draft_prompt(
    profile: &ApplicantProfile,
    target: &JobTarget,
) -> Result<String, EngineError> {
    let profile_json = serde_json::to_string_pretty(profile)?;

    Ok(DRAFT_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", PROFILE_GROUNDING_INSTRUCTION)
        .replace("{profile_json}", &profile_json)
        .replace("{company}", &target.company)
        .replace("{role}", &target.role)
        .replace("{job_description}", &target.job_description))
}

/// Builds the ATS scoring prompt from the drafted resume body.
fn build_ats_prompt(resume_markdown: &str, target: &JobTarget) -> String {
    ATS_SCORE_PROMPT_TEMPLATE
        .replace("{resume_markdown}", resume_markdown)
        .replace("{job_description}", &target.job_description)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
