//! Core domain structs for the leaderboard engine.
//!
//! Three persistence shapes matter here: [`Player`] (owned externally, the
//! engine only reads id and active flag), [`ScoreEvent`] (immutable,
//! append-only fact), and [`LeaderboardEntry`] (the denormalized per-player
//! aggregate the ranking order is computed over). [`ChangeEvent`] is
//! ephemeral -- produced once per committed submission and consumed only by
//! the broadcast fan-out, never persisted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use validator::{Validate, ValidationError};

use crate::enums::GameMode;
use crate::ids::{PlayerId, ScoreEventId};

// ---------------------------------------------------------------------------
// Persistent shapes
// ---------------------------------------------------------------------------

/// A player identity record.
///
/// Profile management is an external concern; the engine reads the id and
/// active flag and denormalizes the display name into the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Player {
    /// Stable unique identifier.
    pub id: PlayerId,
    /// Human-readable display name.
    pub display_name: String,
    /// Whether the player participates in ranking.
    pub active: bool,
    /// When the player record was created.
    pub joined_at: DateTime<Utc>,
}

/// An immutable score fact, created exactly once per submission.
///
/// Score events are append-only: they are never mutated or deleted, so the
/// event log is the audit trail the aggregate totals can be checked against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ScoreEvent {
    /// Unique identifier for this event.
    pub id: ScoreEventId,
    /// The player who earned the score.
    pub player_id: PlayerId,
    /// Score delta added to the player's total.
    #[ts(as = "String")]
    pub delta: Decimal,
    /// Game mode the score was earned in.
    pub game_mode: GameMode,
    /// Wall-clock time of the submission.
    pub occurred_at: DateTime<Utc>,
    /// Duration of the game in milliseconds, if reported.
    pub duration_ms: Option<u64>,
    /// Optional free-form metadata (e.g. `{"won": true}`).
    pub metadata: Option<serde_json::Value>,
}

/// The denormalized per-player ranking aggregate.
///
/// For the set of active entries, `rank` values form a contiguous 1..K
/// sequence with no duplicates, ordered by (total score descending,
/// player id ascending). `total_score` equals the sum of the player's
/// event deltas since the entry became active; both are maintained
/// transactionally by the submission coordinator, never recomputed on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LeaderboardEntry {
    /// The player this aggregate belongs to (unique per entry).
    pub player_id: PlayerId,
    /// Denormalized display name for listing without a join.
    pub display_name: String,
    /// Accumulated total score.
    #[ts(as = "String")]
    pub total_score: Decimal,
    /// Current 1-based rank among active entries.
    pub rank: u64,
    /// Number of score submissions counted into the total.
    pub games_played: u32,
    /// Number of submissions flagged as wins.
    pub wins: u32,
    /// Wins divided by games played, in [0, 1].
    #[ts(as = "String")]
    pub win_rate: Decimal,
    /// Timestamp of the most recent submission.
    pub last_updated: DateTime<Utc>,
    /// Whether this entry participates in ranking.
    ///
    /// Entries are soft-deactivated, never deleted, to preserve audit
    /// continuity with the event log.
    pub active: bool,
}

/// A committed rank change, handed from the coordinator to the broadcast
/// fan-out. Ephemeral -- never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChangeEvent {
    /// The player whose rank changed.
    pub player_id: PlayerId,
    /// Display name at commit time.
    pub display_name: String,
    /// Rank before the submission, if the player was already ranked.
    pub old_rank: Option<u64>,
    /// Rank after the submission.
    pub new_rank: u64,
    /// Total score after the submission.
    #[ts(as = "String")]
    pub new_total: Decimal,
    /// Positions climbed (positive) or dropped (negative).
    pub rank_delta: i64,
    /// Commit timestamp.
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Request / response shapes
// ---------------------------------------------------------------------------

/// Upper bound accepted for a reported game duration (24 hours in ms).
const MAX_DURATION_MS: u64 = 86_400_000;

/// A score submission request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SubmitRequest {
    /// The submitting player.
    pub player_id: PlayerId,
    /// Score earned in this game. Must be non-negative.
    #[validate(custom(function = "non_negative_score"))]
    #[ts(as = "String")]
    pub score: Decimal,
    /// Game mode (defaults to classic).
    #[serde(default)]
    pub game_mode: GameMode,
    /// Duration of the game in milliseconds.
    #[validate(range(max = MAX_DURATION_MS))]
    pub duration_ms: Option<u64>,
    /// Optional additional game data. A `"won": true` field counts the
    /// submission as a win for the win-rate aggregate.
    pub metadata: Option<serde_json::Value>,
}

/// Validate that a submitted score delta is not negative.
fn non_negative_score(score: &Decimal) -> Result<(), ValidationError> {
    if score.is_sign_negative() && !score.is_zero() {
        return Err(ValidationError::new("negative_score"));
    }
    Ok(())
}

/// The outcome of a successful score submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SubmitReceipt {
    /// The score event created by this submission.
    pub event_id: ScoreEventId,
    /// The submitting player.
    pub player_id: PlayerId,
    /// The delta that was applied.
    #[ts(as = "String")]
    pub score: Decimal,
    /// Total score after the submission.
    #[ts(as = "String")]
    pub new_total: Decimal,
    /// Rank after the submission.
    pub new_rank: u64,
    /// Positions climbed (positive) or dropped (negative).
    pub rank_delta: i64,
    /// Human-readable rank-change summary.
    pub message: String,
}

/// A paginated top-N projection of the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TopPage {
    /// The requested page of entries, best first, ranks already assigned.
    pub entries: Vec<LeaderboardEntry>,
    /// Total number of active entries on the board.
    pub total_count: u64,
    /// When this view was computed.
    pub as_of: DateTime<Utc>,
}

/// Detailed rank information for a single player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RankView {
    /// The player queried.
    pub player_id: PlayerId,
    /// Display name.
    pub display_name: String,
    /// Current 1-based rank.
    pub rank: u64,
    /// Accumulated total score.
    #[ts(as = "String")]
    pub total_score: Decimal,
    /// Number of score submissions counted into the total.
    pub games_played: u32,
    /// Wins divided by games played, in [0, 1].
    #[ts(as = "String")]
    pub win_rate: Decimal,
    /// Percentile of active players this player outranks, in [0, 100].
    #[ts(as = "String")]
    pub percentile: Decimal,
    /// When this view was computed.
    pub as_of: DateTime<Utc>,
}

/// Health report for the engine and its collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HealthStatus {
    /// Whether the engine is serving requests.
    pub ok: bool,
    /// Whether the cache backend answered a ping. Reads degrade to direct
    /// computation when this is false; it is not a failure condition.
    pub cache_reachable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_score_fails_validation() {
        let request = SubmitRequest {
            player_id: PlayerId::new(),
            score: Decimal::NEGATIVE_ONE,
            game_mode: GameMode::Classic,
            duration_ms: None,
            metadata: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn zero_score_passes_validation() {
        let request = SubmitRequest {
            player_id: PlayerId::new(),
            score: Decimal::ZERO,
            game_mode: GameMode::Classic,
            duration_ms: Some(1_000),
            metadata: None,
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn oversized_duration_fails_validation() {
        let request = SubmitRequest {
            player_id: PlayerId::new(),
            score: Decimal::ONE_HUNDRED,
            game_mode: GameMode::Survival,
            duration_ms: Some(MAX_DURATION_MS.saturating_add(1)),
            metadata: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn submit_request_game_mode_defaults_to_classic() {
        let json = format!(
            "{{\"player_id\":\"{}\",\"score\":\"1500\"}}",
            PlayerId::new()
        );
        let request: Result<SubmitRequest, _> = serde_json::from_str(&json);
        assert!(matches!(request, Ok(r) if r.game_mode == GameMode::Classic));
    }
}
