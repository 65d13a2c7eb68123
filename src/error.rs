//! Hub error types with HTTP status code mapping.
//!
//! [`ProtocolError`] covers malformed or unexpected client frames; it is
//! answered on the socket and never ends a session. [`HubError`] is the
//! central error type for the REST surface and the hub handle, and maps
//! each variant to a status code and structured JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::MessageKind;

/// Structured JSON error response body.
///
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid request: topic must not be empty"
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Problems with an inbound client frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Frame is not a JSON envelope.
    #[error("invalid message format: {0}")]
    Malformed(String),

    /// The `kind` field names no known kind.
    #[error("unknown message kind: {0}")]
    UnknownKind(String),

    /// Known kind that clients may not send.
    #[error("unsupported message kind: {0}")]
    UnsupportedKind(MessageKind),

    /// Subscribe payload could not be decoded.
    #[error("invalid subscription format: {0}")]
    InvalidSubscription(String),

    /// Unsubscribe payload could not be decoded.
    #[error("invalid unsubscription format: {0}")]
    InvalidUnsubscription(String),

    /// Kind requires a payload and none was given.
    #[error("missing payload for kind {0}")]
    MissingPayload(MessageKind),
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category   | HTTP Status                 |
/// |-----------|------------|-----------------------------|
/// | 1000–1999 | Validation | 400 Bad Request             |
/// | 3000–3999 | Server     | 503 Service Unavailable     |
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Envelope content was rejected.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The hub event loop is no longer running.
    #[error("hub is not running")]
    HubClosed,
}

impl HubError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Protocol(_) => 1002,
            Self::HubClosed => 3001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::Protocol(_) => StatusCode::BAD_REQUEST,
            Self::HubClosed => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_messages_name_the_problem() {
        assert_eq!(
            ProtocolError::UnknownKind("teleport".into()).to_string(),
            "unknown message kind: teleport"
        );
        assert_eq!(
            ProtocolError::UnsupportedKind(MessageKind::OrderUpdate).to_string(),
            "unsupported message kind: order_update"
        );
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            HubError::InvalidRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            HubError::from(ProtocolError::Malformed("x".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            HubError::HubClosed.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(HubError::HubClosed.error_code(), 3001);
    }

    #[test]
    fn into_response_sets_status() {
        let response = HubError::HubClosed.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
