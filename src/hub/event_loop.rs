//! The hub's single-consumer event loop.
//!
//! [`HubLoop`] exclusively owns the membership map. Registration,
//! unregistration and publish dispatch all arrive on one ordered channel
//! and are handled one at a time, so membership is never mutated
//! concurrently with itself or with a broadcast iteration.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::command::{HubCommand, HubStats};
use super::member::Member;
use super::outbox::Enqueue;
use super::router::{self, Target};
use crate::domain::{Envelope, SessionId};

/// Why a member left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Departure {
    Disconnected,
    QueueFull,
    QueueClosed,
}

/// State owned by the hub loop task.
#[derive(Debug, Default)]
pub(crate) struct HubLoop {
    members: HashMap<SessionId, Member>,
    published: u64,
    delivered: u64,
    evicted: u64,
}

impl HubLoop {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Consumes commands until `shutdown` fires or every sender is gone,
    /// then closes all remaining outboxes.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<HubCommand>,
        shutdown: CancellationToken,
    ) {
        tracing::info!("hub event loop started");
        loop {
            let command = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };
            self.handle(command);
        }

        commands.close();
        let remaining = self.members.len();
        for (_, member) in self.members.drain() {
            member.outbox.close();
        }
        tracing::info!(sessions = remaining, "hub event loop stopped");
    }

    pub(crate) fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register(member, reply) => {
                let _ = reply.send(self.register(member));
            }
            HubCommand::Unregister(id) => self.remove(id, Departure::Disconnected),
            HubCommand::Evict(id) => self.remove(id, Departure::QueueFull),
            HubCommand::Publish { target, envelope } => self.dispatch(&target, &envelope),
            HubCommand::Stats(reply) => {
                let _ = reply.send(self.stats());
            }
            HubCommand::Sessions(reply) => {
                let _ = reply.send(self.members.values().map(Member::info).collect());
            }
        }
    }

    /// Returns `true` if the member was added and its welcome queued.
    fn register(&mut self, member: Member) -> bool {
        if self.members.contains_key(&member.id) {
            tracing::debug!(session_id = %member.id, "duplicate registration ignored");
            return false;
        }
        if member.outbox.is_closed() {
            tracing::debug!(session_id = %member.id, "registration of closed session ignored");
            return false;
        }

        let welcome = Arc::new(Envelope::welcome(member.id, &member.user_id));
        if member.outbox.try_push(welcome) != Enqueue::Enqueued {
            tracing::warn!(session_id = %member.id, "welcome could not be queued; dropping session");
            member.outbox.close();
            return false;
        }

        tracing::info!(
            session_id = %member.id,
            user_id = %member.user_id,
            sessions = self.members.len() + 1,
            "session connected"
        );
        self.members.insert(member.id, member);
        true
    }

    fn remove(&mut self, id: SessionId, why: Departure) {
        let Some(member) = self.members.remove(&id) else {
            return;
        };
        member.outbox.close();
        match why {
            Departure::Disconnected => tracing::info!(
                session_id = %id,
                user_id = %member.user_id,
                sessions = self.members.len(),
                "session disconnected"
            ),
            Departure::QueueFull | Departure::QueueClosed => {
                self.evicted += 1;
                tracing::warn!(
                    session_id = %id,
                    user_id = %member.user_id,
                    reason = ?why,
                    sessions = self.members.len(),
                    "session evicted"
                );
            }
        }
    }

    fn dispatch(&mut self, target: &Target, envelope: &Arc<Envelope>) {
        self.published += 1;

        let mut departed = Vec::new();
        let mut delivered = 0u64;
        for member in router::select(self.members.values(), target) {
            match member.outbox.try_push(Arc::clone(envelope)) {
                Enqueue::Enqueued => delivered += 1,
                Enqueue::Full => departed.push((member.id, Departure::QueueFull)),
                Enqueue::Closed => departed.push((member.id, Departure::QueueClosed)),
            }
        }
        self.delivered += delivered;

        tracing::trace!(
            kind = %envelope.kind(),
            topic = target.topic().map(|t| t.as_str()),
            delivered,
            evicted = departed.len(),
            "publish dispatched"
        );

        for (id, why) in departed {
            self.remove(id, why);
        }
    }

    fn stats(&self) -> HubStats {
        HubStats {
            sessions: self.members.len(),
            published: self.published,
            delivered: self.delivered,
            evicted: self.evicted,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::RwLock;

    use tokio::sync::oneshot;

    use super::*;
    use crate::domain::{Body, MessageKind, Subscription, SubscriptionSet, Topic};
    use crate::hub::outbox::{Outbox, OutboxReceiver};

    fn topic(name: &str) -> Topic {
        Topic::parse(name).unwrap_or_else(|e| panic!("{e}"))
    }

    fn member(capacity: usize) -> (Member, OutboxReceiver) {
        let (outbox, rx) = Outbox::bounded(capacity, CancellationToken::new());
        let member = Member::new(
            SessionId::new(),
            "anonymous",
            outbox,
            Arc::new(RwLock::new(SubscriptionSet::new())),
        );
        (member, rx)
    }

    fn register(hub: &mut HubLoop, member: Member) -> bool {
        let (reply, mut answer) = oneshot::channel();
        hub.handle(HubCommand::Register(member, reply));
        answer.try_recv().unwrap_or(false)
    }

    fn event(n: u64) -> Arc<Envelope> {
        Arc::new(Envelope::new(Body::MarketData(serde_json::json!({ "n": n }))))
    }

    #[test]
    fn register_queues_welcome() {
        let mut hub = HubLoop::new();
        let (m, mut rx) = member(4);
        let id = m.id;
        register(&mut hub, m);

        let Ok(welcome) = rx.try_recv() else {
            panic!("welcome expected");
        };
        assert_eq!(welcome.kind(), MessageKind::System);
        let Body::System(notice) = &welcome.body else {
            panic!("system body expected");
        };
        assert_eq!(notice.session_id, id);
        assert_eq!(hub.stats().sessions, 1);
    }

    #[test]
    fn duplicate_register_is_ignored() {
        let mut hub = HubLoop::new();
        let (m, mut rx) = member(4);
        assert!(register(&mut hub, m.clone()));
        assert!(!register(&mut hub, m));
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        assert_eq!(hub.stats().sessions, 1);
    }

    #[test]
    fn unregister_twice_is_noop() {
        let mut hub = HubLoop::new();
        let (m, _rx) = member(4);
        let id = m.id;
        let outbox = m.outbox.clone();
        register(&mut hub, m);
        hub.handle(HubCommand::Unregister(id));
        assert!(outbox.is_closed());
        hub.handle(HubCommand::Unregister(id));
        assert_eq!(hub.stats().sessions, 0);
        assert_eq!(hub.stats().evicted, 0);
    }

    #[test]
    fn evict_counts_as_eviction() {
        let mut hub = HubLoop::new();
        let (m, _rx) = member(4);
        let id = m.id;
        let outbox = m.outbox.clone();
        register(&mut hub, m);
        hub.handle(HubCommand::Evict(id));
        hub.handle(HubCommand::Evict(id));
        assert!(outbox.is_closed());
        let stats = hub.stats();
        assert_eq!(stats.sessions, 0);
        assert_eq!(stats.evicted, 1);
    }

    #[test]
    fn publish_counts_one_attempt_per_member() {
        let mut hub = HubLoop::new();
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (m, rx) = member(8);
            register(&mut hub, m);
            receivers.push(rx);
        }
        hub.handle(HubCommand::Publish {
            target: Target::All,
            envelope: event(1),
        });
        let stats = hub.stats();
        assert_eq!(stats.published, 1);
        assert_eq!(stats.delivered + stats.evicted, 3);
        assert_eq!(stats.delivered, 3);
    }

    #[test]
    fn topic_publish_reaches_only_followers() {
        let mut hub = HubLoop::new();
        let (follower, mut follower_rx) = member(8);
        let (other, mut other_rx) = member(8);
        if let Ok(mut subs) = follower.subscriptions.write() {
            subs.insert(&Subscription::new(topic("orders")));
        }
        register(&mut hub, follower);
        register(&mut hub, other);
        let _ = follower_rx.try_recv();
        let _ = other_rx.try_recv();

        let envelope = event(7);
        hub.handle(HubCommand::Publish {
            target: Target::Topic {
                topic: topic("orders"),
                scope: None,
            },
            envelope: Arc::clone(&envelope),
        });

        assert_eq!(follower_rx.try_recv().ok(), Some(envelope));
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn full_outbox_evicts_only_that_member() {
        let mut hub = HubLoop::new();
        let (slow, _slow_rx) = member(2);
        let (fast, mut fast_rx) = member(2);
        let slow_outbox = slow.outbox.clone();
        register(&mut hub, slow);
        register(&mut hub, fast);
        let _ = fast_rx.try_recv();

        // Slow member already holds its welcome: one more fits, the next overflows.
        for n in 0..3 {
            hub.handle(HubCommand::Publish {
                target: Target::All,
                envelope: event(n),
            });
            assert!(fast_rx.try_recv().is_ok());
        }

        assert!(slow_outbox.is_closed());
        let stats = hub.stats();
        assert_eq!(stats.sessions, 1);
        assert_eq!(stats.evicted, 1);
        assert_eq!(stats.delivered, 4);
    }

    #[test]
    fn closed_outbox_is_evicted_on_publish() {
        let mut hub = HubLoop::new();
        let (m, rx) = member(4);
        register(&mut hub, m);
        drop(rx);
        hub.handle(HubCommand::Publish {
            target: Target::All,
            envelope: event(0),
        });
        assert_eq!(hub.stats().sessions, 0);
        assert_eq!(hub.stats().evicted, 1);
    }

    #[tokio::test]
    async fn shutdown_closes_all_outboxes() {
        let (tx, rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(HubLoop::new().run(rx, shutdown.clone()));

        let (m, _mrx) = member(4);
        let outbox = m.outbox.clone();
        let (reply_tx, reply_rx) = oneshot::channel();
        assert!(tx.send(HubCommand::Register(m, reply_tx)).await.is_ok());
        assert_eq!(reply_rx.await.ok(), Some(true));
        let (reply_tx, reply_rx) = oneshot::channel();
        assert!(tx.send(HubCommand::Stats(reply_tx)).await.is_ok());
        assert_eq!(reply_rx.await.ok().map(|s| s.sessions), Some(1));

        shutdown.cancel();
        assert!(task.await.is_ok());
        assert!(outbox.is_closed());
    }
}
