//! Publish endpoints: the HTTP ingestion point for event producers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{PublishRequest, PublishResponse};
use crate::app_state::AppState;
use crate::domain::Topic;
use crate::error::HubError;

/// `POST /publish` — Broadcast an event to every connected session.
#[utoipa::path(
    post,
    path = "/api/v1/publish",
    tag = "Publish",
    summary = "Global broadcast",
    request_body = PublishRequest,
    responses(
        (status = 202, description = "Event accepted for delivery", body = PublishResponse),
        (status = 400, description = "Kind cannot be published"),
        (status = 503, description = "Hub is not running"),
    )
)]
pub async fn publish_handler(
    State(state): State<AppState>,
    Json(req): Json<PublishRequest>,
) -> Result<impl IntoResponse, HubError> {
    let (envelope, _) = req.into_envelope()?;
    state.hub.publish(envelope).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(PublishResponse {
            accepted: true,
            topic: None,
        }),
    ))
}

/// `POST /topics/{topic}/publish` — Send an event to a topic's subscribers.
#[utoipa::path(
    post,
    path = "/api/v1/topics/{topic}/publish",
    tag = "Publish",
    summary = "Topic publish",
    params(("topic" = String, Path, description = "Topic name")),
    request_body = PublishRequest,
    responses(
        (status = 202, description = "Event accepted for delivery", body = PublishResponse),
        (status = 400, description = "Invalid topic or kind"),
        (status = 503, description = "Hub is not running"),
    )
)]
pub async fn publish_topic_handler(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    Json(req): Json<PublishRequest>,
) -> Result<impl IntoResponse, HubError> {
    let topic = Topic::parse(topic).map_err(HubError::InvalidRequest)?;
    let (envelope, scope) = req.into_envelope()?;
    let name = topic.to_string();
    match scope {
        Some(scope) => state.hub.publish_scoped(topic, scope, envelope).await?,
        None => state.hub.publish_to_topic(topic, envelope).await?,
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(PublishResponse {
            accepted: true,
            topic: Some(name),
        }),
    ))
}

/// Publish routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/publish", post(publish_handler))
        .route("/topics/{topic}/publish", post(publish_topic_handler))
}
