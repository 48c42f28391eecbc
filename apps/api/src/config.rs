use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Panics at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Default drafting concurrency for batch runs when the request does
    /// not ask for one. Clamped to the allowed range at run time.
    pub batch_concurrency: usize,
    /// Per-item drafting deadline in seconds.
    pub item_timeout_secs: u64,
    /// Timeout for a single Anthropic API request in seconds. Should stay
    /// well below the per-item deadline so a retry still fits.
    pub llm_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            batch_concurrency: std::env::var("BATCH_CONCURRENCY")
                .unwrap_or_else(|_| "2".to_string())
                .parse::<usize>()
                .context("BATCH_CONCURRENCY must be a positive integer")?,
            item_timeout_secs: std::env::var("BATCH_ITEM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "45".to_string())
                .parse::<u64>()
                .context("BATCH_ITEM_TIMEOUT_SECS must be a positive integer")?,
            llm_timeout_secs: std::env::var("LLM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse::<u64>()
                .context("LLM_TIMEOUT_SECS must be a positive integer")?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
