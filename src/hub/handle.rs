//! Public contract of the hub.
//!
//! [`HubHandle`] is the only way to reach the hub loop. Every operation
//! enqueues a [`HubCommand`] on the loop's ordered channel; nothing here
//! touches membership directly.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::command::{HubCommand, HubStats};
use super::event_loop::HubLoop;
use super::member::{Member, SessionInfo};
use super::router::Target;
use crate::domain::{Envelope, Scope, SessionId, Topic};
use crate::error::HubError;

/// Cloneable handle to a running hub.
///
/// Publishers hold one of these and see neither session identities nor
/// delivery outcomes: publishing is fire-and-forget once accepted.
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Spawns the hub loop on the current Tokio runtime.
    ///
    /// The loop stops when `shutdown` is cancelled or every handle has been
    /// dropped; the returned [`JoinHandle`] completes afterwards.
    #[must_use]
    pub fn spawn(command_capacity: usize, shutdown: CancellationToken) -> (Self, JoinHandle<()>) {
        let (commands, rx) = mpsc::channel(command_capacity.max(1));
        let task = tokio::spawn(HubLoop::new().run(rx, shutdown));
        (Self { commands }, task)
    }

    /// Makes `member` visible to future publishes and queues its
    /// `system/connected` welcome. Resolves only after the hub has handled
    /// the registration, so anything the caller pushes to the member's
    /// outbox afterwards lands behind the welcome.
    ///
    /// Returns `false` if the registration was ignored: the session was
    /// already registered, its outbox was closed, or the welcome did not
    /// fit.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubClosed`] if the hub loop has stopped.
    pub async fn register(&self, member: Member) -> Result<bool, HubError> {
        let (tx, rx) = oneshot::channel();
        self.send(HubCommand::Register(member, tx)).await?;
        rx.await.map_err(|_| HubError::HubClosed)
    }

    /// Removes a session and closes its outbox. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubClosed`] if the hub loop has stopped.
    pub async fn unregister(&self, session_id: SessionId) -> Result<(), HubError> {
        self.send(HubCommand::Unregister(session_id)).await
    }

    /// Removes a session that fell behind on its own replies and counts it
    /// in [`HubStats::evicted`].
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubClosed`] if the hub loop has stopped.
    pub async fn evict(&self, session_id: SessionId) -> Result<(), HubError> {
        self.send(HubCommand::Evict(session_id)).await
    }

    /// Broadcasts `envelope` to every registered session.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubClosed`] if the hub loop has stopped.
    pub async fn publish(&self, envelope: Envelope) -> Result<(), HubError> {
        self.publish_to(Target::All, envelope).await
    }

    /// Sends `envelope` to sessions currently subscribed to `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubClosed`] if the hub loop has stopped.
    pub async fn publish_to_topic(&self, topic: Topic, envelope: Envelope) -> Result<(), HubError> {
        self.publish_to(Target::Topic { topic, scope: None }, envelope)
            .await
    }

    /// Like [`HubHandle::publish_to_topic`], but only subscribers whose
    /// filters accept `scope` receive the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubClosed`] if the hub loop has stopped.
    pub async fn publish_scoped(
        &self,
        topic: Topic,
        scope: Scope,
        envelope: Envelope,
    ) -> Result<(), HubError> {
        self.publish_to(
            Target::Topic {
                topic,
                scope: Some(scope),
            },
            envelope,
        )
        .await
    }

    /// Publishes `envelope` to an explicit [`Target`].
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubClosed`] if the hub loop has stopped.
    pub async fn publish_to(&self, target: Target, envelope: Envelope) -> Result<(), HubError> {
        self.send(HubCommand::Publish {
            target,
            envelope: Arc::new(envelope),
        })
        .await
    }

    /// Returns hub counters as of this point in the event stream.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubClosed`] if the hub loop has stopped.
    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (tx, rx) = oneshot::channel();
        self.send(HubCommand::Stats(tx)).await?;
        rx.await.map_err(|_| HubError::HubClosed)
    }

    /// Returns a snapshot of the registered sessions.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubClosed`] if the hub loop has stopped.
    pub async fn sessions(&self) -> Result<Vec<SessionInfo>, HubError> {
        let (tx, rx) = oneshot::channel();
        self.send(HubCommand::Sessions(tx)).await?;
        rx.await.map_err(|_| HubError::HubClosed)
    }

    /// Returns `true` if the hub loop is no longer accepting commands.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| HubError::HubClosed)
    }
}
