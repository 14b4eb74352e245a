//! Rank-change fan-out over a bounded broadcast channel.
//!
//! Each change event is serialized exactly once into an `Arc<str>` and
//! cloned per subscriber, so fan-out cost does not scale with payload
//! size. The channel is bounded: a subscriber that stops draining falls
//! behind, observes [`tokio::sync::broadcast::error::RecvError::Lagged`],
//! and is expected to disconnect rather than stall the publisher. Publish
//! never blocks on slow subscribers.

use std::sync::Arc;

use tokio::sync::broadcast;

use podium_types::{ChangeEvent, StreamMessage};

/// Default bound on undelivered messages per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// Lifecycle of one stream connection.
///
/// A connection must deliver its snapshot before it may stream, and
/// [`ConnectionState::Closed`] is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, snapshot not yet sent.
    Connecting,
    /// Snapshot delivered, not yet streaming.
    SnapshotSent,
    /// Relaying live updates.
    Streaming,
    /// Shutting down, no further sends.
    Closing,
    /// Terminal.
    Closed,
}

impl ConnectionState {
    /// Step to the next lifecycle state.
    pub const fn advance(self) -> Self {
        match self {
            Self::Connecting => Self::SnapshotSent,
            Self::SnapshotSent => Self::Streaming,
            Self::Streaming => Self::Closing,
            Self::Closing | Self::Closed => Self::Closed,
        }
    }

    /// Whether the connection may relay live updates.
    pub const fn is_streaming(self) -> bool {
        matches!(self, Self::Streaming)
    }
}

/// Publisher side of the rank-change stream.
#[derive(Debug, Clone)]
pub struct BroadcastManager {
    tx: broadcast::Sender<Arc<str>>,
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BroadcastManager {
    /// Create a manager whose subscribers each buffer up to `capacity`
    /// undelivered messages.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Serialize `event` once and offer it to every current subscriber.
    ///
    /// Returns the number of subscribers the message was offered to.
    /// Zero subscribers is not an error; the event is simply dropped.
    pub fn publish(&self, event: &ChangeEvent) -> Result<usize, serde_json::Error> {
        let message = StreamMessage::from(event.clone());
        let payload: Arc<str> = Arc::from(serde_json::to_string(&message)?);
        let delivered = self.tx.send(payload).unwrap_or(0);
        tracing::debug!(
            player_id = %event.player_id,
            new_rank = event.new_rank,
            subscribers = delivered,
            "rank change published"
        );
        Ok(delivered)
    }

    /// Open a new subscription starting at the current stream position.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
