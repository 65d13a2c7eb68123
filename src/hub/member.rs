//! The hub's view of a registered session.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::outbox::Outbox;
use crate::domain::{Scope, SessionId, SubscriptionSet, Topic};

/// Subscription set shared between a session's read pump (sole writer) and
/// the hub's router (reader). The lock is never held across an `.await`.
pub type SharedSubscriptions = Arc<RwLock<SubscriptionSet>>;

/// A session as registered with the hub.
#[derive(Debug, Clone)]
pub struct Member {
    /// Session identity.
    pub id: SessionId,
    /// User the connection belongs to.
    pub user_id: String,
    /// Outbound queue of the session.
    pub outbox: Outbox,
    /// Topics the session follows.
    pub subscriptions: SharedSubscriptions,
    /// Registration instant.
    pub connected_at: DateTime<Utc>,
}

impl Member {
    /// Creates a member record.
    #[must_use]
    pub fn new(
        id: SessionId,
        user_id: impl Into<String>,
        outbox: Outbox,
        subscriptions: SharedSubscriptions,
    ) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            outbox,
            subscriptions,
            connected_at: Utc::now(),
        }
    }

    /// Returns `true` if the member follows `topic` and its filters accept
    /// `scope`. A poisoned lock reads as "not subscribed".
    #[must_use]
    pub fn follows(&self, topic: &Topic, scope: Option<&Scope>) -> bool {
        self.subscriptions
            .read()
            .map(|subs| subs.matches(topic, scope))
            .unwrap_or(false)
    }

    /// Snapshot of this member for operators.
    #[must_use]
    pub fn info(&self) -> SessionInfo {
        let topics = self
            .subscriptions
            .read()
            .map(|subs| subs.topics().into_iter().map(String::from).collect())
            .unwrap_or_default();
        SessionInfo {
            session_id: self.id.to_string(),
            user_id: self.user_id.clone(),
            topics,
            connected_at: self.connected_at,
        }
    }
}

/// Point-in-time description of a registered session.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionInfo {
    /// Session identity.
    pub session_id: String,
    /// User the connection belongs to.
    pub user_id: String,
    /// Subscribed topics, sorted.
    pub topics: Vec<String>,
    /// Registration instant.
    pub connected_at: DateTime<Utc>,
}
