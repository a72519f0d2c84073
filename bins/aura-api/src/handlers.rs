// HTTP route handlers for the Aura API

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use aura_common::types::{ExecutionRequest, Language, TestCase};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::mentor::HintRequest;
use crate::metrics;
use crate::pair::{PairSession, StreamFrame};
use crate::review::EvaluationRequest;
use crate::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Deserialize)]
pub struct ExecuteBody {
    pub code: String,
    pub language: String,
    pub test_cases: Vec<TestCase>,
    /// Falls back to the configured default when absent or zero
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
}

fn effective_time_limit(requested: Option<u64>, default_ms: u64) -> u64 {
    requested.filter(|ms| *ms > 0).unwrap_or(default_ms)
}

#[derive(Debug, Deserialize)]
pub struct EndSessionBody {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    pub services: HashMap<&'static str, &'static str>,
}

fn error_body(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// GET / - Service banner
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Aura API",
        "status": "running",
        "version": VERSION,
    }))
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    let services = HashMap::from([
        ("code_executor", "operational"),
        ("ai_mentor", "operational"),
    ]);
    Json(HealthStatus {
        status: "healthy",
        version: VERSION,
        timestamp: chrono::Utc::now().to_rfc3339(),
        services,
    })
}

/// GET /health/live
pub async fn liveness_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

/// GET /health/ready
pub async fn readiness_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ready" }))
}

/// POST /api/sandbox/execute - Run a submission against its test cases
pub async fn execute_code(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExecuteBody>,
) -> impl IntoResponse {
    let request_id = Uuid::new_v4();
    let request = ExecutionRequest {
        code: body.code,
        language: body.language,
        test_cases: body.test_cases,
        time_limit_ms: effective_time_limit(body.time_limit_ms, state.config.default_time_limit_ms),
    };

    info!(
        request_id = %request_id,
        language = %request.language,
        test_cases = request.test_cases.len(),
        "Execution requested"
    );

    let started = Instant::now();
    let result = state.executor.execute(&request).await;

    let language_label = request
        .language
        .parse::<Language>()
        .map(|l| l.as_str())
        .unwrap_or("unknown");
    metrics::record_execution(language_label, &result, started.elapsed().as_secs_f64());

    info!(
        request_id = %request_id,
        success = result.success,
        passed = result.passed_count(),
        total = result.outcomes.len(),
        execution_time_ms = result.total_execution_time_ms,
        "Execution finished"
    );

    (StatusCode::OK, Json(result))
}

/// GET /api/sandbox/status
pub async fn sandbox_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ready",
        "supported_languages": state.executor.supported_languages(),
    }))
}

/// POST /api/mentor/hint - Coaching hint, rate gated per session
pub async fn generate_hint(
    State(state): State<Arc<AppState>>,
    Json(request): Json<HintRequest>,
) -> impl IntoResponse {
    if let Some(session_id) = request.session_id.as_deref().filter(|s| !s.is_empty()) {
        let gap = Duration::from_secs(state.config.hint_cooldown_secs);
        if !state.cooldown.allow(session_id, gap) {
            metrics::COOLDOWN_REJECTIONS_TOTAL.inc();
            warn!(session_id, "Hint request rejected by cooldown");
            return error_body(
                StatusCode::TOO_MANY_REQUESTS,
                format!(
                    "Please wait {} seconds between hint requests",
                    state.config.hint_cooldown_secs
                ),
            );
        }
    }

    let response = state.mentor.generate_hint(&request).await;
    (StatusCode::OK, Json(response)).into_response()
}

/// POST /api/evaluate - Rubric evaluation of a submission
pub async fn evaluate_code(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EvaluationRequest>,
) -> impl IntoResponse {
    if request.code.trim().is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "Code cannot be empty");
    }
    if request.challenge_title.is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "challenge_title is required");
    }

    let response = state.reviewer.evaluate(&request).await;
    (StatusCode::OK, Json(response)).into_response()
}

fn ndjson_line(frame: &StreamFrame) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(frame)?;
    line.push('\n');
    Ok(line)
}

/// POST /api/pair-programmer/session/stream - NDJSON stream of one pair session
pub async fn pair_session_stream(
    State(state): State<Arc<AppState>>,
    Json(session): Json<PairSession>,
) -> impl IntoResponse {
    info!(
        session_id = %session.session_id,
        language = %session.language,
        "Pair programming session started"
    );

    let lines = state
        .pair
        .stream_session(session)
        .map(|frame| ndjson_line(&frame));

    (
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    )
}

/// POST /api/pair-programmer/next-step - One-shot next step suggestion
pub async fn pair_next_step(
    State(state): State<Arc<AppState>>,
    Json(session): Json<PairSession>,
) -> impl IntoResponse {
    Json(state.pair.next_step(&session).await)
}

/// POST /api/pair-programmer/end-session
pub async fn pair_end_session(Json(body): Json<EndSessionBody>) -> impl IntoResponse {
    info!(session_id = ?body.session_id, "Pair programming session ended");
    Json(serde_json::json!({
        "status": "closed",
        "session_id": body.session_id,
        "message": "Pair programming session ended",
    }))
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
