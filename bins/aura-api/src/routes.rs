use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/health/live", get(handlers::liveness_check))
        .route("/health/ready", get(handlers::readiness_check))
        .route("/api/sandbox/execute", post(handlers::execute_code))
        .route("/api/sandbox/status", get(handlers::sandbox_status))
        .route("/api/mentor/hint", post(handlers::generate_hint))
        .route("/api/evaluate", post(handlers::evaluate_code))
        .route("/api/pair-programmer/session/stream", post(handlers::pair_session_stream))
        .route("/api/pair-programmer/next-step", post(handlers::pair_next_step))
        .route("/api/pair-programmer/end-session", post(handlers::pair_end_session))
        .route("/metrics", get(handlers::metrics_handler))
}
