//! Liveness contract of a session.
//!
//! ```text
//!            ping sent              deadline reached
//! Active ───────────────► Pending ──────────────────► Expired (terminal)
//!   ▲                        │
//!   └──── any inbound frame ─┘
//! ```
//!
//! Any inbound frame renews the read deadline to `now + timeout`, not only
//! a pong. Once expired the session is torn down and never revives.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Liveness state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Deadline not reached and no ping outstanding.
    Active,
    /// A ping was sent since the last inbound frame.
    Pending,
    /// No frame arrived before the deadline.
    Expired,
}

/// Read-deadline tracker.
#[derive(Debug, Clone)]
pub struct Keepalive {
    timeout: Duration,
    deadline: Instant,
    ping_outstanding: bool,
    expired: bool,
}

impl Keepalive {
    /// Starts tracking with the first deadline at `now + timeout`.
    #[must_use]
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            deadline: now + timeout,
            ping_outstanding: false,
            expired: false,
        }
    }

    /// Current read deadline.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Records an inbound frame. Has no effect once expired.
    pub fn renew(&mut self, now: Instant) -> Liveness {
        if self.poll(now) == Liveness::Expired {
            return Liveness::Expired;
        }
        self.deadline = now + self.timeout;
        self.ping_outstanding = false;
        Liveness::Active
    }

    /// Records that the write pump sent a heartbeat ping.
    pub fn ping_sent(&mut self, now: Instant) {
        if self.poll(now) != Liveness::Expired {
            self.ping_outstanding = true;
        }
    }

    /// Evaluates the state at `now`, latching [`Liveness::Expired`].
    pub fn poll(&mut self, now: Instant) -> Liveness {
        if self.expired || now >= self.deadline {
            self.expired = true;
            Liveness::Expired
        } else if self.ping_outstanding {
            Liveness::Pending
        } else {
            Liveness::Active
        }
    }
}

/// [`Keepalive`] shared by the read pump (renews) and the write pump
/// (records pings). The lock is only held for field updates.
#[derive(Debug, Clone)]
pub struct SharedKeepalive(Arc<Mutex<Keepalive>>);

impl SharedKeepalive {
    /// Starts tracking from now.
    #[must_use]
    pub fn start(timeout: Duration) -> Self {
        Self(Arc::new(Mutex::new(Keepalive::new(timeout, Instant::now()))))
    }

    fn with<R>(&self, f: impl FnOnce(&mut Keepalive) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// See [`Keepalive::deadline`].
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.with(|k| k.deadline())
    }

    /// See [`Keepalive::renew`].
    pub fn renew(&self) -> Liveness {
        self.with(|k| k.renew(Instant::now()))
    }

    /// See [`Keepalive::ping_sent`].
    pub fn ping_sent(&self) {
        self.with(|k| k.ping_sent(Instant::now()));
    }

    /// See [`Keepalive::poll`].
    pub fn poll(&self) -> Liveness {
        self.with(|k| k.poll(Instant::now()))
    }
}
