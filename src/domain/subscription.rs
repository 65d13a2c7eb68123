//! Topics, subscriptions, and the per-session subscription set.
//!
//! A session registers interest in named [`Topic`]s, optionally narrowed by
//! instrument or account filters. Publishers address a topic and may attach
//! a [`Scope`] that is checked against those filters.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Maximum topic length in bytes.
pub const MAX_TOPIC_LEN: usize = 128;

/// Validated topic name (non-empty, at most [`MAX_TOPIC_LEN`] bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    /// Parses a topic name.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the name is empty, only
    /// whitespace, or longer than [`MAX_TOPIC_LEN`] bytes.
    pub fn parse(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("topic must not be empty".to_string());
        }
        if name.len() > MAX_TOPIC_LEN {
            return Err(format!("topic exceeds {MAX_TOPIC_LEN} bytes"));
        }
        Ok(Self(name))
    }

    /// Returns the topic name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Topic {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A client's request to receive events for one topic.
///
/// Empty filter lists accept everything published to the topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Topic to follow. Older clients send this field as `type`.
    #[serde(alias = "type")]
    pub topic: Topic,
    /// Instrument identifiers narrowing the topic.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instruments: Vec<String>,
    /// Account identifiers narrowing the topic.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub account_ids: Vec<String>,
}

impl Subscription {
    /// Creates an unfiltered subscription to `topic`.
    #[must_use]
    pub fn new(topic: Topic) -> Self {
        Self {
            topic,
            instruments: Vec::new(),
            account_ids: Vec::new(),
        }
    }
}

/// Publisher-side qualifier for a topic event.
///
/// A field left as `None` places no constraint on subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Scope {
    /// Instrument the event concerns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    /// Account the event concerns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}

/// Filter state stored per subscribed topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Filters {
    instruments: HashSet<String>,
    account_ids: HashSet<String>,
}

impl Filters {
    fn accepts(&self, scope: &Scope) -> bool {
        let instrument_ok = match &scope.instrument {
            Some(i) if !self.instruments.is_empty() => self.instruments.contains(i),
            _ => true,
        };
        let account_ok = match &scope.account_id {
            Some(a) if !self.account_ids.is_empty() => self.account_ids.contains(a),
            _ => true,
        };
        instrument_ok && account_ok
    }
}

/// The set of topics a single session is subscribed to.
///
/// Written only by the owning session's read pump; read by the hub when
/// routing topic publishes.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    topics: HashMap<Topic, Filters>,
}

impl SubscriptionSet {
    /// Creates an empty subscription set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a subscription, replacing the filters of an existing one.
    ///
    /// Returns `true` if the topic was not subscribed before.
    pub fn insert(&mut self, subscription: &Subscription) -> bool {
        let filters = Filters {
            instruments: subscription.instruments.iter().cloned().collect(),
            account_ids: subscription.account_ids.iter().cloned().collect(),
        };
        self.topics
            .insert(subscription.topic.clone(), filters)
            .is_none()
    }

    /// Removes a topic. Returns `true` if it was subscribed.
    pub fn remove(&mut self, topic: &Topic) -> bool {
        self.topics.remove(topic).is_some()
    }

    /// Returns `true` if `topic` is subscribed, regardless of filters.
    #[must_use]
    pub fn contains(&self, topic: &Topic) -> bool {
        self.topics.contains_key(topic)
    }

    /// Returns `true` if an event on `topic` qualified by `scope` should be
    /// delivered to this session.
    #[must_use]
    pub fn matches(&self, topic: &Topic, scope: Option<&Scope>) -> bool {
        match (self.topics.get(topic), scope) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(filters), Some(scope)) => filters.accepts(scope),
        }
    }

    /// Returns the subscribed topics in lexical order.
    #[must_use]
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self.topics.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Returns the number of subscribed topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Returns `true` if nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
