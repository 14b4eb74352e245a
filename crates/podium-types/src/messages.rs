//! Wire messages for the live leaderboard stream.
//!
//! A subscriber receives exactly one [`StreamMessage::Snapshot`] on connect,
//! followed by zero or more [`StreamMessage::Update`] messages until
//! disconnect. Delivery is at-most-once with no replay: a subscriber that
//! connects after an update has fanned out sees its effect in the snapshot
//! instead of the discrete notification.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::PlayerId;
use crate::structs::{ChangeEvent, LeaderboardEntry};

/// A message delivered over the leaderboard stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event_type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum StreamMessage {
    /// The full current ordered view, sent once per connection.
    Snapshot {
        /// All active entries, best first, ranks assigned.
        entries: Vec<LeaderboardEntry>,
        /// When the snapshot was computed.
        timestamp: DateTime<Utc>,
    },
    /// A single committed rank change.
    Update {
        /// The player whose rank changed.
        player_id: PlayerId,
        /// Display name at commit time.
        display_name: String,
        /// Rank before the submission, if previously ranked.
        old_rank: Option<u64>,
        /// Rank after the submission.
        new_rank: u64,
        /// Total score after the submission.
        #[ts(as = "String")]
        total_score: Decimal,
        /// Positions climbed (positive) or dropped (negative).
        rank_delta: i64,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl From<ChangeEvent> for StreamMessage {
    fn from(change: ChangeEvent) -> Self {
        Self::Update {
            player_id: change.player_id,
            display_name: change.display_name,
            old_rank: change.old_rank,
            new_rank: change.new_rank,
            total_score: change.new_total,
            rank_delta: change.rank_delta,
            timestamp: change.timestamp,
        }
    }
}
