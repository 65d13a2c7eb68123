//! DTOs for the publish endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Body, Envelope, MessageKind, Scope};
use crate::error::HubError;

/// Request body for `POST /publish` and `POST /topics/{topic}/publish`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishRequest {
    /// Domain event kind (`market_data`, `order_update`, `operation`,
    /// `bot_status`).
    pub kind: MessageKind,
    /// Optional sub-verb.
    #[serde(default)]
    pub action: Option<String>,
    /// Event payload, forwarded untouched.
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    /// Optional qualifier matched against subscriber filters. Ignored for
    /// global publishes.
    #[serde(default)]
    pub scope: Option<Scope>,
}

impl PublishRequest {
    /// Converts the request into an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidRequest`] if `kind` is not a domain event
    /// kind.
    pub fn into_envelope(self) -> Result<(Envelope, Option<Scope>), HubError> {
        if !self.kind.is_domain_event() {
            return Err(HubError::InvalidRequest(format!(
                "kind {} cannot be published",
                self.kind
            )));
        }
        let body = Body::decode(self.kind, Some(self.payload), None)?;
        let mut envelope = Envelope::new(body);
        envelope.action = self.action;
        Ok((envelope, self.scope))
    }
}

/// Response body for accepted publishes (202 Accepted).
#[derive(Debug, Serialize, ToSchema)]
pub struct PublishResponse {
    /// Always `true`; delivery itself is best-effort.
    pub accepted: bool,
    /// Topic addressed, absent for global publishes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}
