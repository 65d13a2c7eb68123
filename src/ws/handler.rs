//! Axum WebSocket upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::session::{ANONYMOUS, Session, SessionConfig};
use crate::app_state::AppState;

/// Query parameters accepted on `/ws`.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Caller-supplied user identity.
    pub user_id: Option<String>,
}

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let user_id = params
        .user_id
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| ANONYMOUS.to_string());
    let session = Session::new(
        state.hub.clone(),
        user_id,
        SessionConfig::from(state.config.as_ref()),
        &state.shutdown,
    );

    let session_id = session.id();

    ws.max_message_size(state.config.max_message_size)
        .on_failed_upgrade(move |e| {
            tracing::warn!(session_id = %session_id, error = %e, "websocket upgrade failed");
        })
        .on_upgrade(move |socket| session.run(socket))
}
