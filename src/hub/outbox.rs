//! Bounded outbound queue of a single session.
//!
//! Every writer (the hub's dispatch, the session's own replies) uses
//! [`Outbox::try_push`], which never waits: a full queue is reported back
//! so the caller can evict the session instead of stalling. The only
//! reader is the session's write pump.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::Envelope;

/// Receiving half of an [`Outbox`], drained by the write pump.
pub type OutboxReceiver = mpsc::Receiver<Arc<Envelope>>;

/// Outcome of a non-blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    /// The envelope is queued for delivery.
    Enqueued,
    /// The queue is at capacity; the consumer is too slow.
    Full,
    /// The outbox has been closed; nothing more will be delivered.
    Closed,
}

/// Writer side of a session's outbound queue.
///
/// Closing is tied to a [`CancellationToken`] shared with the session's
/// pumps, so closing the outbox also stops the session.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<Arc<Envelope>>,
    closed: CancellationToken,
}

impl Outbox {
    /// Creates an outbox holding at most `capacity` envelopes, closed when
    /// `closed` is cancelled.
    #[must_use]
    pub fn bounded(capacity: usize, closed: CancellationToken) -> (Self, OutboxReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, closed }, rx)
    }

    /// Attempts to enqueue without waiting.
    pub fn try_push(&self, envelope: Arc<Envelope>) -> Enqueue {
        if self.closed.is_cancelled() {
            return Enqueue::Closed;
        }
        match self.tx.try_send(envelope) {
            Ok(()) => Enqueue::Enqueued,
            Err(mpsc::error::TrySendError::Full(_)) => Enqueue::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Enqueue::Closed,
        }
    }

    /// Closes the outbox. Queued envelopes are discarded by the reader.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Returns `true` once the outbox has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}
