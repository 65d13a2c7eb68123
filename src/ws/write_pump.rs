//! Outbound half of a session: drain the outbox and send heartbeats.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::keepalive::SharedKeepalive;
use super::messages;
use crate::domain::{Envelope, SessionId};
use crate::hub::OutboxReceiver;

/// Why the write pump stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteExit {
    /// The outbox was closed or the session cancelled.
    Closed,
    /// The transport rejected a write.
    Transport(String),
    /// A write did not complete within the write deadline.
    Timeout,
}

/// Everything the write pump needs besides the sink and the queue.
#[derive(Debug)]
pub struct WritePump {
    /// Owning session; stamped onto every envelope.
    pub session_id: SessionId,
    /// Session-wide stop signal. Cancelled by this pump when it exits.
    pub token: CancellationToken,
    /// Informed of every heartbeat ping.
    pub keepalive: SharedKeepalive,
    /// Interval between heartbeat pings.
    pub heartbeat_interval: Duration,
    /// Deadline for one flush or ping.
    pub write_timeout: Duration,
    /// Most envelopes written per flush.
    pub batch_limit: usize,
}

impl WritePump {
    /// Writes queued envelopes and heartbeats until the session ends, then
    /// closes the sink. Envelopes still queued at that point are dropped.
    pub async fn run<W>(self, mut sink: W, mut queue: OutboxReceiver) -> WriteExit
    where
        W: Sink<Message> + Unpin,
        W::Error: Display,
    {
        let mut heartbeat = tokio::time::interval_at(
            Instant::now() + self.heartbeat_interval,
            self.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let exit = loop {
            tokio::select! {
                biased;
                () = self.token.cancelled() => break WriteExit::Closed,
                _ = heartbeat.tick() => {
                    let ping = sink.send(Message::Ping(Bytes::new()));
                    match tokio::time::timeout(self.write_timeout, ping).await {
                        Ok(Ok(())) => self.keepalive.ping_sent(),
                        Ok(Err(e)) => break WriteExit::Transport(e.to_string()),
                        Err(_) => break WriteExit::Timeout,
                    }
                }
                next = queue.recv() => match next {
                    Some(first) => {
                        if let Err(exit) = self.flush_batch(&mut sink, &mut queue, first).await {
                            break exit;
                        }
                    }
                    None => break WriteExit::Closed,
                },
            }
        };

        self.token.cancel();
        queue.close();
        if exit == WriteExit::Closed {
            let _ = tokio::time::timeout(self.write_timeout, sink.send(Message::Close(None))).await;
        }
        let _ = tokio::time::timeout(self.write_timeout, sink.close()).await;
        exit
    }

    /// Encodes `first` plus whatever is already queued and writes them as
    /// consecutive frames with a single flush.
    async fn flush_batch<W>(
        &self,
        sink: &mut W,
        queue: &mut OutboxReceiver,
        first: Arc<Envelope>,
    ) -> Result<usize, WriteExit>
    where
        W: Sink<Message> + Unpin,
        W::Error: Display,
    {
        let mut frames = Vec::new();
        self.encode_into(&first, &mut frames);
        let mut taken = 1;
        while taken < self.batch_limit {
            let Ok(next) = queue.try_recv() else {
                break;
            };
            self.encode_into(&next, &mut frames);
            taken += 1;
        }
        if frames.is_empty() {
            return Ok(0);
        }

        let written = frames.len();
        let write = async {
            for frame in frames {
                sink.feed(Message::text(frame)).await?;
            }
            sink.flush().await
        };
        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(())) => Ok(written),
            Ok(Err(e)) => Err(WriteExit::Transport(e.to_string())),
            Err(_) => Err(WriteExit::Timeout),
        }
    }

    fn encode_into(&self, envelope: &Envelope, frames: &mut Vec<String>) {
        match messages::encode(envelope, self.session_id) {
            Ok(text) => frames.push(text),
            Err(e) => {
                tracing::error!(
                    session_id = %self.session_id,
                    kind = %envelope.kind(),
                    error = %e,
                    "failed to encode envelope; dropped"
                );
            }
        }
    }
}
