//! Connection registry and broadcast dispatch.
//!
//! ```text
//! publishers ─┐
//! sessions  ──┼─► HubHandle ─► ordered channel ─► HubLoop ─► router ─► Outbox (per session)
//! ```
//!
//! The loop is the single owner of membership. Delivery into a session's
//! [`Outbox`] never waits: a full outbox evicts the session.

pub mod command;
mod event_loop;
pub mod handle;
pub mod member;
pub mod outbox;
pub mod router;

pub use command::{HubCommand, HubStats};
pub use handle::HubHandle;
pub use member::{Member, SessionInfo, SharedSubscriptions};
pub use outbox::{Enqueue, Outbox, OutboxReceiver};
pub use router::Target;
