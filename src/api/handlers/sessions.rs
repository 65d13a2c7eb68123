//! Operator views of the hub: membership and counters.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::error::HubError;
use crate::hub::{HubStats, SessionInfo};

/// `GET /sessions` — Registered sessions.
#[utoipa::path(
    get,
    path = "/api/v1/sessions",
    tag = "Hub",
    summary = "List sessions",
    responses(
        (status = 200, description = "Membership snapshot", body = Vec<SessionInfo>),
        (status = 503, description = "Hub is not running"),
    )
)]
pub async fn sessions_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, HubError> {
    let mut sessions = state.hub.sessions().await?;
    sessions.sort_by_key(|s| s.connected_at);
    Ok(Json(sessions))
}

/// `GET /stats` — Hub counters.
#[utoipa::path(
    get,
    path = "/api/v1/stats",
    tag = "Hub",
    summary = "Hub counters",
    responses(
        (status = 200, description = "Counters", body = HubStats),
        (status = 503, description = "Hub is not running"),
    )
)]
pub async fn stats_handler(State(state): State<AppState>) -> Result<impl IntoResponse, HubError> {
    Ok(Json(state.hub.stats().await?))
}

/// Hub inspection routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(sessions_handler))
        .route("/stats", get(stats_handler))
}
