//! # notify-hub
//!
//! Real-time notification hub for a trading backend.
//!
//! Clients connect over WebSocket, subscribe to named topics, and receive
//! the events producers publish to those topics. Every connection owns a
//! bounded outbound queue; a client that cannot keep up is disconnected
//! instead of slowing anyone else down.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket)           Producers (HTTP, in-process)
//!     │                               │
//!     ├── Session (ws/)               ├── REST publish (api/)
//!     │     read pump ─ subscriptions │
//!     │     write pump ◄─ Outbox ◄────┤
//!     │                               │
//!     └──────────► HubHandle ─► hub loop (hub/) ─► router
//! ```
//!
//! Membership is owned by a single hub task; all registration, removal and
//! dispatch go through its ordered channel.

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod hub;
pub mod server;
pub mod ws;
