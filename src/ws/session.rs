//! Per-connection session actor.
//!
//! A [`Session`] registers with the hub, then runs a write pump on its own
//! task and the read pump on the connection task. Whichever side stops
//! first brings the other down through the session's cancellation token,
//! and the session leaves the hub exactly once.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::extract::ws::WebSocket;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use super::keepalive::SharedKeepalive;
use super::read_pump::{ReadExit, ReadPump};
use super::write_pump::WritePump;
use crate::config::HubConfig;
use crate::domain::{SessionId, SubscriptionSet};
use crate::hub::{HubHandle, Member, Outbox, SharedSubscriptions};

/// User identity used when the client supplies none.
pub const ANONYMOUS: &str = "anonymous";

/// Shortest ping interval; a zero period would stall the heartbeat timer.
const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1);

/// Timing and sizing knobs of a session.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Outbound queue capacity in envelopes.
    pub outbound_queue_capacity: usize,
    /// Silence allowed before the session expires.
    pub heartbeat_timeout: Duration,
    /// Interval between server pings.
    pub heartbeat_interval: Duration,
    /// Deadline for one write.
    pub write_timeout: Duration,
}

impl From<&HubConfig> for SessionConfig {
    fn from(config: &HubConfig) -> Self {
        Self {
            outbound_queue_capacity: config.outbound_queue_capacity,
            heartbeat_timeout: config.heartbeat_timeout,
            heartbeat_interval: config.heartbeat_interval().max(MIN_HEARTBEAT_INTERVAL),
            write_timeout: config.write_timeout,
        }
    }
}

/// One accepted WebSocket connection.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    user_id: String,
    hub: HubHandle,
    config: SessionConfig,
    token: CancellationToken,
}

impl Session {
    /// Creates a session whose lifetime is bounded by `shutdown`.
    #[must_use]
    pub fn new(
        hub: HubHandle,
        user_id: impl Into<String>,
        config: SessionConfig,
        shutdown: &CancellationToken,
    ) -> Self {
        Self {
            id: SessionId::new(),
            user_id: user_id.into(),
            hub,
            config,
            token: shutdown.child_token(),
        }
    }

    /// Identity assigned to this session.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Drives the session until the connection ends, the hub evicts it, or
    /// the process shuts down.
    pub async fn run(self, socket: WebSocket) {
        let Self {
            id,
            user_id,
            hub,
            config,
            token,
        } = self;

        let (outbox, queue) = Outbox::bounded(config.outbound_queue_capacity, token.clone());
        let subscriptions: SharedSubscriptions = Arc::new(RwLock::new(SubscriptionSet::new()));
        let keepalive = SharedKeepalive::start(config.heartbeat_timeout);

        let member = Member::new(id, user_id.clone(), outbox.clone(), Arc::clone(&subscriptions));
        match hub.register(member).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(session_id = %id, "registration ignored by hub");
                return;
            }
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "session could not be registered");
                return;
            }
        }

        let (sink, stream) = socket.split();
        let writer = tokio::spawn(
            WritePump {
                session_id: id,
                token: token.clone(),
                keepalive: keepalive.clone(),
                heartbeat_interval: config.heartbeat_interval,
                write_timeout: config.write_timeout,
                batch_limit: config.outbound_queue_capacity,
            }
            .run(sink, queue),
        );

        let read_exit = ReadPump {
            session_id: id,
            outbox,
            subscriptions,
            keepalive,
            token: token.clone(),
        }
        .run(stream)
        .await;

        match &read_exit {
            ReadExit::Expired => {
                tracing::info!(session_id = %id, user_id = %user_id, "heartbeat timeout");
            }
            ReadExit::QueueFull => {
                tracing::warn!(session_id = %id, user_id = %user_id, "outbound queue full");
            }
            ReadExit::Transport(e) => {
                tracing::debug!(session_id = %id, error = %e, "read failed");
            }
            ReadExit::PeerClosed | ReadExit::Cancelled => {}
        }

        let left = if read_exit == ReadExit::QueueFull {
            hub.evict(id).await
        } else {
            hub.unregister(id).await
        };
        if let Err(e) = left {
            tracing::debug!(session_id = %id, error = %e, "unregister skipped");
        }
        token.cancel();

        match writer.await {
            Ok(write_exit) => {
                tracing::debug!(session_id = %id, read = ?read_exit, write = ?write_exit, "session ended");
            }
            Err(e) => tracing::warn!(session_id = %id, error = %e, "write pump panicked"),
        }
    }
}
