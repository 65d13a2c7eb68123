//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Resource endpoints are mounted under `/api/v1`; `/health` sits at the
//! root.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI description of the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "notify-hub", description = "Real-time notification hub"),
    paths(
        handlers::system::health_handler,
        handlers::publish::publish_handler,
        handlers::publish::publish_topic_handler,
        handlers::sessions::sessions_handler,
        handlers::sessions::stats_handler,
    ),
    tags(
        (name = "System", description = "Service health"),
        (name = "Publish", description = "Event ingestion"),
        (name = "Hub", description = "Connection registry inspection"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}
