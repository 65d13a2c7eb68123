//! Domain layer: session identity, subscriptions, and the message envelope.
//!
//! These are the leaf data types shared by the hub and the WebSocket
//! sessions. Nothing here performs I/O.

pub mod envelope;
pub mod session_id;
pub mod subscription;

pub use envelope::{Body, Envelope, MessageKind, SystemNotice};
pub use session_id::SessionId;
pub use subscription::{Scope, Subscription, SubscriptionSet, Topic};
