pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::batch::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Batch API
        .route(
            "/api/v1/batches",
            post(handlers::handle_create_batch).get(handlers::handle_list_batches),
        )
        .route("/api/v1/batches/:id", get(handlers::handle_get_batch))
        .route(
            "/api/v1/batches/:id/items",
            post(handlers::handle_add_items),
        )
        .route(
            "/api/v1/batches/:id/items/:item_id",
            get(handlers::handle_get_item),
        )
        .route("/api/v1/batches/:id/run", post(handlers::handle_run_batch))
        .with_state(state)
}
