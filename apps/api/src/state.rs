use std::sync::Arc;

use crate::batch::runner::BatchRunner;
use crate::batch::store::BatchStore;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Durable store behind a trait object so tests can swap in a double.
    pub store: Arc<dyn BatchStore>,
    pub runner: Arc<BatchRunner>,
    pub config: Config,
}
