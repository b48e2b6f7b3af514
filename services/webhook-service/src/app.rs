use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{healthz, readyz, workfront_webhook};
use crate::state::AppState;

/// Webhook batches may exceed axum's 2 MB default body limit, so it is replaced
/// with `max_body_bytes`.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/", post(workfront_webhook))
        .route("/v1/workfront/events", post(workfront_webhook))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
