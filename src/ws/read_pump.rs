//! Inbound half of a session: decode client frames and act on them.
//!
//! The read pump is the only writer of its session's subscription set.
//! Protocol errors are answered with an `error` envelope and the loop keeps
//! going; transport errors, deadline expiry, and a full outbox end it.

use std::sync::{Arc, PoisonError};

use axum::extract::ws::Message;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use super::keepalive::{Liveness, SharedKeepalive};
use super::messages;
use crate::domain::{Body, Envelope, SessionId};
use crate::error::ProtocolError;
use crate::hub::{Enqueue, Outbox, SharedSubscriptions};

/// Why the read pump stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadExit {
    /// The client closed the connection or the stream ended.
    PeerClosed,
    /// The transport reported an error.
    Transport(String),
    /// No frame arrived before the read deadline.
    Expired,
    /// A reply could not be queued because the outbox is full.
    QueueFull,
    /// The session was closed from elsewhere (eviction, write failure,
    /// shutdown).
    Cancelled,
}

/// Everything the read pump needs besides the stream.
#[derive(Debug)]
pub struct ReadPump {
    /// Owning session.
    pub session_id: SessionId,
    /// Where replies go.
    pub outbox: Outbox,
    /// Subscription set this pump owns.
    pub subscriptions: SharedSubscriptions,
    /// Read deadline tracker.
    pub keepalive: SharedKeepalive,
    /// Session-wide stop signal.
    pub token: CancellationToken,
}

impl ReadPump {
    /// Reads frames until the session ends.
    pub async fn run<R>(self, mut stream: R) -> ReadExit
    where
        R: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        loop {
            let deadline = self.keepalive.deadline();
            let next = tokio::select! {
                biased;
                () = self.token.cancelled() => return ReadExit::Cancelled,
                next = tokio::time::timeout_at(deadline, stream.next()) => next,
            };

            let message = match next {
                Err(_) => {
                    if self.keepalive.poll() == Liveness::Expired {
                        return ReadExit::Expired;
                    }
                    continue;
                }
                Ok(None) => return ReadExit::PeerClosed,
                Ok(Some(Err(e))) => return ReadExit::Transport(e.to_string()),
                Ok(Some(Ok(message))) => message,
            };

            if self.keepalive.renew() == Liveness::Expired {
                return ReadExit::Expired;
            }

            let reply = match message {
                Message::Text(text) => self.respond(text.as_str()),
                Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                    Ok(text) => self.respond(text),
                    Err(_) => Some(Envelope::error(
                        ProtocolError::Malformed("binary frame is not UTF-8".to_string())
                            .to_string(),
                    )),
                },
                Message::Ping(_) | Message::Pong(_) => None,
                Message::Close(_) => return ReadExit::PeerClosed,
            };

            if let Some(reply) = reply {
                match self.outbox.try_push(Arc::new(reply)) {
                    Enqueue::Enqueued => {}
                    Enqueue::Full => return ReadExit::QueueFull,
                    Enqueue::Closed => return ReadExit::Cancelled,
                }
            }
        }
    }

    /// Handles one decoded text frame and returns the reply to queue.
    pub(crate) fn respond(&self, text: &str) -> Option<Envelope> {
        let envelope = match messages::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(session_id = %self.session_id, error = %e, "rejected client frame");
                return Some(Envelope::error(e.to_string()));
            }
        };

        match envelope.body {
            Body::Subscribe(subscription) => {
                self.subscriptions
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(&subscription);
                tracing::info!(
                    session_id = %self.session_id,
                    topic = %subscription.topic,
                    "subscribed"
                );
                Some(Envelope::subscribed(subscription))
            }
            Body::Unsubscribe(subscription) => {
                self.subscriptions
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&subscription.topic);
                tracing::info!(
                    session_id = %self.session_id,
                    topic = %subscription.topic,
                    "unsubscribed"
                );
                Some(Envelope::unsubscribed(subscription))
            }
            Body::Ping => Some(Envelope::pong()),
            Body::Pong => None,
            other => {
                let e = ProtocolError::UnsupportedKind(other.kind());
                tracing::debug!(session_id = %self.session_id, error = %e, "rejected client frame");
                Some(Envelope::error(e.to_string()))
            }
        }
    }
}
