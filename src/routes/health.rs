use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct LlmHealthResponse {
    pub status: &'static str,
    pub circuit_breaker_open: bool,
    pub failure_count: u32,
    pub backup_configured: bool,
    pub message: String,
}

/// GET /: service banner.
pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Welcome to Perspective Prism API" }))
}

/// GET /health: liveness only; never reports provider trouble.
pub async fn health_check() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health/llm: provider routing health. Degraded still answers 200.
pub async fn llm_health(State(state): State<AppState>) -> Json<LlmHealthResponse> {
    let breaker = state.invoker.breaker_status();
    let backup_configured = state.invoker.backup_configured();

    let (status, message) = match (breaker.open, backup_configured) {
        (false, true) => ("healthy", "Primary provider healthy, backup available".to_string()),
        (false, false) => (
            "degraded",
            "Primary provider healthy, no backup provider configured".to_string(),
        ),
        (true, true) => (
            "degraded",
            format!(
                "Circuit breaker OPEN after {} consecutive failures, routing to backup provider",
                breaker.failure_count
            ),
        ),
        (true, false) => (
            "degraded",
            format!(
                "Circuit breaker OPEN after {} consecutive failures and no backup provider configured",
                breaker.failure_count
            ),
        ),
    };

    Json(LlmHealthResponse {
        status,
        circuit_breaker_open: breaker.open,
        failure_count: breaker.failure_count,
        backup_configured,
        message,
    })
}
