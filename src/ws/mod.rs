//! WebSocket layer: upgrade, per-connection sessions, and keepalive.
//!
//! The endpoint at `/ws` accepts an optional `user_id` query parameter.
//! Each connection becomes a [`session::Session`] with a read pump and a
//! write pump.

pub mod handler;
pub mod keepalive;
pub mod messages;
pub mod read_pump;
pub mod session;
pub mod write_pump;
