use crate::{db::check_connection, handlers::AppState};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::OnceLock;
use std::time::Instant;

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Initialize the start time (call this on application startup)
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

/// `GET /health`: 200 when the database answers, 503 otherwise
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    match check_connection(state.db.pool()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "database": "up",
                "latency_ms": start.elapsed().as_millis() as u64,
            })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unavailable",
                    "database": "down",
                })),
            )
        }
    }
}

/// `GET /api/v1/status`
pub async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "service": "branchflow-api",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "uptime_secs": uptime_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
