//! Typed message envelope exchanged with WebSocket clients.
//!
//! On the wire an envelope is a permissive JSON object keyed by `kind`
//! (see [`crate::ws::messages`]). Inside the crate it is an [`Envelope`]
//! whose [`Body`] is a sum type over the known kinds, each carrying its own
//! payload shape. Payload and error text are mutually exclusive by
//! construction: only [`Body::Error`] carries error text.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::{SessionId, Subscription};
use crate::error::ProtocolError;

/// Discriminator carried in the `kind` field of every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Server notice (e.g. `connected`).
    System,
    /// Client → server: follow a topic.
    Subscribe,
    /// Client → server: stop following a topic.
    Unsubscribe,
    /// Server → client: subscription acknowledgement.
    Subscription,
    /// Application-level liveness probe.
    Ping,
    /// Reply to [`MessageKind::Ping`].
    Pong,
    /// Server → client: protocol error report.
    Error,
    /// Market data event (quotes, candles, order book).
    MarketData,
    /// Order state change.
    OrderUpdate,
    /// Account operation (trade, dividend, fee).
    Operation,
    /// Trading bot lifecycle change.
    BotStatus,
}

impl MessageKind {
    /// Returns the wire name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::Subscription => "subscription",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Error => "error",
            Self::MarketData => "market_data",
            Self::OrderUpdate => "order_update",
            Self::Operation => "operation",
            Self::BotStatus => "bot_status",
        }
    }

    /// Returns `true` for kinds produced by publishers rather than by the
    /// protocol itself.
    #[must_use]
    pub const fn is_domain_event(&self) -> bool {
        matches!(
            self,
            Self::MarketData | Self::OrderUpdate | Self::Operation | Self::BotStatus
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "system" => Self::System,
            "subscribe" => Self::Subscribe,
            "unsubscribe" => Self::Unsubscribe,
            "subscription" => Self::Subscription,
            "ping" => Self::Ping,
            "pong" => Self::Pong,
            "error" => Self::Error,
            "market_data" => Self::MarketData,
            "order_update" => Self::OrderUpdate,
            "operation" => Self::Operation,
            "bot_status" => Self::BotStatus,
            other => return Err(ProtocolError::UnknownKind(other.to_string())),
        })
    }
}

/// Payload of the `system/connected` welcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemNotice {
    /// Identity assigned to the session.
    pub session_id: SessionId,
    /// User the connection was opened for.
    pub user_id: String,
}

/// Kind-specific content of an envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Server notice.
    System(SystemNotice),
    /// Subscribe request.
    Subscribe(Subscription),
    /// Unsubscribe request; only the topic is significant.
    Unsubscribe(Subscription),
    /// Subscription acknowledgement echoing the request.
    Subscription(Subscription),
    /// Liveness probe.
    Ping,
    /// Liveness reply.
    Pong,
    /// Human-readable protocol error.
    Error(String),
    /// Market data event.
    MarketData(Value),
    /// Order update event.
    OrderUpdate(Value),
    /// Account operation event.
    Operation(Value),
    /// Bot lifecycle event.
    BotStatus(Value),
}

impl Body {
    /// Returns the discriminator for this body.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::System(_) => MessageKind::System,
            Self::Subscribe(_) => MessageKind::Subscribe,
            Self::Unsubscribe(_) => MessageKind::Unsubscribe,
            Self::Subscription(_) => MessageKind::Subscription,
            Self::Ping => MessageKind::Ping,
            Self::Pong => MessageKind::Pong,
            Self::Error(_) => MessageKind::Error,
            Self::MarketData(_) => MessageKind::MarketData,
            Self::OrderUpdate(_) => MessageKind::OrderUpdate,
            Self::Operation(_) => MessageKind::Operation,
            Self::BotStatus(_) => MessageKind::BotStatus,
        }
    }

    /// Builds a body once the discriminant is known, decoding `payload`
    /// into the shape that `kind` requires.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] if a required payload is missing or does
    /// not have the expected shape.
    pub fn decode(
        kind: MessageKind,
        payload: Option<Value>,
        error: Option<String>,
    ) -> Result<Self, ProtocolError> {
        match kind {
            MessageKind::System => {
                let payload = payload.ok_or(ProtocolError::MissingPayload(kind))?;
                serde_json::from_value(payload)
                    .map(Self::System)
                    .map_err(|e| ProtocolError::Malformed(e.to_string()))
            }
            MessageKind::Subscribe | MessageKind::Subscription => {
                parse_subscription(payload)
                    .map(|sub| {
                        if kind == MessageKind::Subscribe {
                            Self::Subscribe(sub)
                        } else {
                            Self::Subscription(sub)
                        }
                    })
                    .map_err(ProtocolError::InvalidSubscription)
            }
            MessageKind::Unsubscribe => parse_subscription(payload)
                .map(Self::Unsubscribe)
                .map_err(ProtocolError::InvalidUnsubscription),
            MessageKind::Ping => Ok(Self::Ping),
            MessageKind::Pong => Ok(Self::Pong),
            MessageKind::Error => Ok(Self::Error(
                error.unwrap_or_else(|| "unspecified error".to_string()),
            )),
            MessageKind::MarketData
            | MessageKind::OrderUpdate
            | MessageKind::Operation
            | MessageKind::BotStatus => {
                let payload = payload.ok_or(ProtocolError::MissingPayload(kind))?;
                Ok(match kind {
                    MessageKind::MarketData => Self::MarketData(payload),
                    MessageKind::OrderUpdate => Self::OrderUpdate(payload),
                    MessageKind::Operation => Self::Operation(payload),
                    _ => Self::BotStatus(payload),
                })
            }
        }
    }

    /// Returns the JSON payload for the wire, if this kind has one.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if a typed payload cannot be encoded.
    pub fn payload(&self) -> Result<Option<Value>, serde_json::Error> {
        Ok(match self {
            Self::System(notice) => Some(serde_json::to_value(notice)?),
            Self::Subscribe(sub) | Self::Unsubscribe(sub) | Self::Subscription(sub) => {
                Some(serde_json::to_value(sub)?)
            }
            Self::Ping | Self::Pong | Self::Error(_) => None,
            Self::MarketData(v) | Self::OrderUpdate(v) | Self::Operation(v) | Self::BotStatus(v) => {
                Some(v.clone())
            }
        })
    }

    /// Returns the error text for [`Body::Error`].
    #[must_use]
    pub fn error_text(&self) -> Option<&str> {
        match self {
            Self::Error(text) => Some(text),
            _ => None,
        }
    }
}

fn parse_subscription(payload: Option<Value>) -> Result<Subscription, String> {
    let payload = payload.ok_or_else(|| "missing payload".to_string())?;
    serde_json::from_value(payload).map_err(|e| e.to_string())
}

/// The unit exchanged with clients.
///
/// The session identity is not part of this type: the writing session
/// stamps it at encode time, so one `Envelope` can be shared across every
/// session a publish fans out to.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Kind-specific content.
    pub body: Body,
    /// Optional sub-verb (e.g. `connected`, `subscribed`).
    pub action: Option<String>,
    /// Instant the envelope was created.
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Creates an envelope stamped with the current time.
    #[must_use]
    pub fn new(body: Body) -> Self {
        Self {
            body,
            action: None,
            timestamp: Utc::now(),
        }
    }

    /// Sets the action sub-verb.
    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Returns the discriminator of the body.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        self.body.kind()
    }

    /// `system/connected` welcome for a freshly registered session.
    #[must_use]
    pub fn welcome(session_id: SessionId, user_id: &str) -> Self {
        Self::new(Body::System(SystemNotice {
            session_id,
            user_id: user_id.to_string(),
        }))
        .with_action("connected")
    }

    /// Reply to an application-level ping.
    #[must_use]
    pub fn pong() -> Self {
        Self::new(Body::Pong).with_action("ping_response")
    }

    /// Protocol error report.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Body::Error(message.into()))
    }

    /// `subscription/subscribed` acknowledgement.
    #[must_use]
    pub fn subscribed(subscription: Subscription) -> Self {
        Self::new(Body::Subscription(subscription)).with_action("subscribed")
    }

    /// `subscription/unsubscribed` acknowledgement.
    #[must_use]
    pub fn unsubscribed(subscription: Subscription) -> Self {
        Self::new(Body::Subscription(subscription)).with_action("unsubscribed")
    }
}
