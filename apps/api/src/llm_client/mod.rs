//! LLM client — the single point of entry for all Claude API calls in
//! Pathway.
//!
//! ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
//! All LLM interactions MUST go through this module.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls in Pathway.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";
/// Drafting returns a resume and a cover letter in one response, so the
/// token ceiling is higher than a typical single-document call.
const MAX_TOKENS: u32 = 8192;
const MAX_ATTEMPTS: u32 = 3;
/// Anthropic's non-standard "overloaded" status. Retried like a 5xx.
const OVERLOADED: u16 = 529;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Gave up after {attempts} attempts: {message}")]
    Exhausted { attempts: u32, message: String },

    #[error("LLM returned empty content")]
    EmptyContent,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// The single LLM client shared by every service in Pathway.
/// Wraps the Anthropic Messages API with retry logic and structured output
/// helpers. Drafting and scoring each make exactly one `call_json` per item.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    /// `request_timeout` bounds a single HTTP exchange. It must sit well
    /// below the pipeline's per-item deadline so a retry still fits.
    pub fn new(api_key: String, request_timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(request_timeout)
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    /// Makes a raw call to the Claude API, returning the full response
    /// object. Retries on 429, 529 (overloaded), and 5xx with exponential
    /// backoff, honoring a `retry-after` header when the API sends one.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let body = MessagesRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: [UserMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut last_message = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            let response = match self.send(&body).await {
                Ok(r) => r,
                Err(e) if attempt < MAX_ATTEMPTS => {
                    last_message = e.to_string();
                    warn!("LLM request failed on attempt {attempt}: {e}");
                    tokio::time::sleep(backoff_delay(attempt, None)).await;
                    continue;
                }
                Err(e) => return Err(LlmError::Http(e)),
            };

            let status = response.status();
            if status.is_success() {
                let parsed: LlmResponse = response.json().await?;
                debug!(
                    "LLM call succeeded: input_tokens={}, output_tokens={}",
                    parsed.usage.input_tokens, parsed.usage.output_tokens
                );
                return Ok(parsed);
            }

            if !retryable(status) {
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: error_message(response).await,
                });
            }

            let retry_after = retry_after_hint(&response);
            last_message = error_message(response).await;
            warn!(
                "LLM API returned {} on attempt {attempt}: {last_message}",
                status.as_u16()
            );
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(backoff_delay(attempt, retry_after)).await;
            }
        }

        Err(LlmError::Exhausted {
            attempts: MAX_ATTEMPTS,
            message: last_message,
        })
    }

    /// Convenience method that calls the LLM and deserializes the text
    /// response as JSON. The prompt must instruct the model to return valid
    /// JSON.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<T, LlmError> {
        let response = self.call(prompt, system).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;

        // Strip markdown code fences if the model wraps JSON in them
        serde_json::from_str(strip_json_fences(text)).map_err(LlmError::Parse)
    }

    async fn send(&self, body: &MessagesRequest<'_>) -> Result<Response, reqwest::Error> {
        self.client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
    }
}

fn retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status.as_u16() == OVERLOADED
        || status.is_server_error()
}

/// Backoff for the next attempt: 1s, 2s, 4s — or the API's own
/// `retry-after` hint when it asks for longer.
fn backoff_delay(attempt: u32, retry_after: Option<Duration>) -> Duration {
    let exponential = Duration::from_millis(1000 * (1 << (attempt - 1)));
    retry_after.map_or(exponential, |hint| hint.max(exponential))
}

fn retry_after_hint(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Pulls the human-readable message out of an Anthropic error body, falling
/// back to the raw body text.
async fn error_message(response: Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    for prefix in ["```json", "```"] {
        if let Some(inner) = text.strip_prefix(prefix) {
            let inner = inner.trim_start();
            return inner.strip_suffix("```").map(str::trim).unwrap_or(inner);
        }
    }
    text
}
