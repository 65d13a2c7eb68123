//! WebSocket wire format: JSON text frames carrying one envelope each.
//!
//! ```json
//! {
//!   "kind": "subscription",
//!   "action": "subscribed",
//!   "payload": { "topic": "orders" },
//!   "timestamp": "2024-05-01T12:00:00Z",
//!   "session_id": "7c1d…"
//! }
//! ```
//!
//! Decoding reads the permissive frame first and only then decodes the
//! payload for the named kind. Client-supplied `timestamp` and
//! `session_id` are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Body, Envelope, MessageKind, SessionId};
use crate::error::ProtocolError;

/// Outbound frame as serialized to the client.
#[derive(Debug, Serialize)]
struct OutboundFrame<'a> {
    kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    timestamp: DateTime<Utc>,
    session_id: SessionId,
}

/// Inbound frame before the payload is interpreted.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    kind: String,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Encodes `envelope` for the session `session_id`.
///
/// # Errors
///
/// Returns a serialization error if the payload cannot be encoded.
pub fn encode(envelope: &Envelope, session_id: SessionId) -> Result<String, serde_json::Error> {
    let frame = OutboundFrame {
        kind: envelope.kind(),
        action: envelope.action.as_deref(),
        payload: envelope.body.payload()?,
        error: envelope.body.error_text(),
        timestamp: envelope.timestamp,
        session_id,
    };
    serde_json::to_string(&frame)
}

/// Decodes one client frame. The resulting envelope is timestamped with
/// the time of receipt.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if the text is not an envelope,
/// [`ProtocolError::UnknownKind`] for an unrecognised `kind`, or the
/// payload error of [`Body::decode`].
pub fn decode(text: &str) -> Result<Envelope, ProtocolError> {
    let frame: InboundFrame =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    let kind: MessageKind = frame.kind.parse()?;
    let body = Body::decode(kind, frame.payload, frame.error)?;
    let mut envelope = Envelope::new(body);
    envelope.action = frame.action;
    Ok(envelope)
}
