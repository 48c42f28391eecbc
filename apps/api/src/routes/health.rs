use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::state::AppState;

/// GET /health
/// Returns a simple status object after probing store connectivity.
pub async fn health_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    state.store.ping().await?;

    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "pathway-api"
    })))
}
