//! Events consumed by the hub's serialized loop.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::oneshot;
use utoipa::ToSchema;

use super::member::{Member, SessionInfo};
use super::router::Target;
use crate::domain::{Envelope, SessionId};

/// One unit of work for the hub loop, processed in submission order.
#[derive(Debug)]
pub enum HubCommand {
    /// Add a session to the membership set. The reply is `true` once the
    /// welcome is queued, `false` if the registration was ignored.
    Register(Member, oneshot::Sender<bool>),
    /// Remove a session and close its outbox.
    Unregister(SessionId),
    /// Remove a session that could not keep up and count it as evicted.
    Evict(SessionId),
    /// Fan an envelope out to `target`.
    Publish {
        /// Audience.
        target: Target,
        /// Envelope shared by every recipient.
        envelope: Arc<Envelope>,
    },
    /// Report counters.
    Stats(oneshot::Sender<HubStats>),
    /// Report the membership snapshot.
    Sessions(oneshot::Sender<Vec<SessionInfo>>),
}

/// Hub counters, read inside the loop so they are consistent with
/// membership at that point of the event stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct HubStats {
    /// Sessions currently registered.
    pub sessions: usize,
    /// Publish events processed.
    pub published: u64,
    /// Envelopes successfully enqueued to sessions.
    pub delivered: u64,
    /// Sessions evicted because their outbox was full or closed.
    pub evicted: u64,
}
