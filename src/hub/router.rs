//! Broadcast routing: which members receive a published envelope.
//!
//! Pure selection over a membership snapshot. Fan-out order across members
//! is unspecified; only per-session delivery order is guaranteed, and that
//! comes from the outbox, not from here.

use crate::domain::{Scope, Topic};

use super::member::Member;

/// Audience of a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every registered session.
    All,
    /// Sessions following `topic`, optionally narrowed by `scope`.
    Topic {
        /// Topic addressed.
        topic: Topic,
        /// Qualifier checked against subscription filters.
        scope: Option<Scope>,
    },
}

impl Target {
    /// Returns `true` if `member` belongs to this audience.
    #[must_use]
    pub fn admits(&self, member: &Member) -> bool {
        match self {
            Self::All => true,
            Self::Topic { topic, scope } => member.follows(topic, scope.as_ref()),
        }
    }

    /// Topic name for logging; `None` for a global publish.
    #[must_use]
    pub fn topic(&self) -> Option<&Topic> {
        match self {
            Self::All => None,
            Self::Topic { topic, .. } => Some(topic),
        }
    }
}

/// Selects the members that should receive a publish to `target`.
pub fn select<'a, I>(members: I, target: &'a Target) -> impl Iterator<Item = &'a Member> + 'a
where
    I: IntoIterator<Item = &'a Member>,
    I::IntoIter: 'a,
{
    members.into_iter().filter(move |m| target.admits(m))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::{Arc, RwLock};

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::domain::{SessionId, Subscription, SubscriptionSet};
    use crate::hub::outbox::Outbox;

    fn topic(name: &str) -> Topic {
        Topic::parse(name).unwrap_or_else(|e| panic!("{e}"))
    }

    fn member(topics: &[&str]) -> Member {
        let mut set = SubscriptionSet::new();
        for t in topics {
            set.insert(&Subscription::new(topic(t)));
        }
        let (outbox, _rx) = Outbox::bounded(4, CancellationToken::new());
        Member::new(SessionId::new(), "anonymous", outbox, Arc::new(RwLock::new(set)))
    }

    #[test]
    fn global_target_selects_everyone() {
        let members = vec![member(&[]), member(&["orders"])];
        assert_eq!(select(&members, &Target::All).count(), 2);
    }

    #[test]
    fn topic_target_selects_only_followers() {
        let members = vec![member(&["orders"]), member(&["market_data"]), member(&[])];
        let target = Target::Topic {
            topic: topic("orders"),
            scope: None,
        };
        let selected: Vec<_> = select(&members, &target).map(|m| m.id).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected.first(), members.first().map(|m| &m.id));
    }

    #[test]
    fn scoped_target_respects_filters() {
        let m = member(&[]);
        if let Ok(mut subs) = m.subscriptions.write() {
            let mut sub = Subscription::new(topic("market_data"));
            sub.instruments = vec!["SBER".to_string()];
            subs.insert(&sub);
        }
        let members = vec![m];
        let hit = Target::Topic {
            topic: topic("market_data"),
            scope: Some(Scope {
                instrument: Some("SBER".to_string()),
                account_id: None,
            }),
        };
        let miss = Target::Topic {
            topic: topic("market_data"),
            scope: Some(Scope {
                instrument: Some("GAZP".to_string()),
                account_id: None,
            }),
        };
        assert_eq!(select(&members, &hit).count(), 1);
        assert_eq!(select(&members, &miss).count(), 0);
    }

    #[test]
    fn target_topic_accessor() {
        assert!(Target::All.topic().is_none());
        let t = Target::Topic {
            topic: topic("orders"),
            scope: None,
        };
        assert_eq!(t.topic().map(Topic::as_str), Some("orders"));
    }
}
