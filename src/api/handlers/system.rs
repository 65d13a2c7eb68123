//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    websocket_hub: HubHealth,
}

/// Hub section of the health check.
#[derive(Debug, Serialize, ToSchema)]
struct HubHealth {
    status: String,
    sessions: Option<usize>,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health, version, and live session count.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Hub is not running", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (status, hub) = match state.hub.stats().await {
        Ok(stats) => (
            StatusCode::OK,
            HubHealth {
                status: "ok".to_string(),
                sessions: Some(stats.sessions),
            },
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            HubHealth {
                status: "unavailable".to_string(),
                sessions: None,
            },
        ),
    };
    (
        status,
        Json(HealthResponse {
            status: if status.is_success() { "healthy" } else { "degraded" }.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            websocket_hub: hub,
        }),
    )
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
