use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;

use crate::AppState;

/// Component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    pub message: String,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub version: String,
    pub timestamp: String,
    pub uptime_secs: u64,
    pub database: ComponentHealth,
}

static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Call once on startup so uptime is measured from boot.
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn get_uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

/// Pings the database and reports 503 when it is unreachable.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_check_start = Instant::now();
    let db_result = crate::db::check_connection(&state.db).await;
    let latency_ms = db_check_start.elapsed().as_millis() as u64;

    let database = ComponentHealth {
        status: if db_result.is_ok() {
            ComponentStatus::Up
        } else {
            ComponentStatus::Down
        },
        message: db_result.map_or_else(
            |e| format!("Connection failed: {}", e),
            |_| "Connection successful".to_string(),
        ),
        latency_ms,
    };

    let status_code = match database.status {
        ComponentStatus::Up => StatusCode::OK,
        ComponentStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };

    let response = HealthResponse {
        status: database.status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_secs: get_uptime_secs(),
        database,
    };

    (status_code, Json(response))
}

/// Liveness only; never touches dependencies.
async fn liveness_check() -> impl IntoResponse {
    Json(json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// - GET /health       - database-backed status
/// - GET /health/live  - liveness probe
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness_check))
}
