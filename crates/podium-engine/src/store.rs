//! Storage contract between the ranking engine and its store collaborator.
//!
//! The engine does not mandate a storage technology; it requires the
//! primitives named here. The contract is intentionally whole-operation
//! grained: [`LeaderboardStore::commit_submit`] performs the event append,
//! aggregate fold, and rank write as one atomic unit, so each backend can
//! use its own transaction mechanism (an in-memory write lock, a SQL
//! transaction) without leaking it through the trait.
//!
//! Read methods never take the write path's ordering lock. They see a
//! momentarily stale but internally consistent view, which is the
//! bounded-staleness the cache layer is allowed to serve.

use core::future::Future;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use podium_types::{GameMode, LeaderboardEntry, Player, PlayerId, ScoreEvent, ScoreEventId};

/// Errors surfaced by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The submitting player does not exist.
    #[error("player not found: {0}")]
    PlayerNotFound(PlayerId),

    /// A backend operation failed. The enclosing transaction, if any,
    /// was rolled back.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Serialization of a stored value failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One atomic submission, prepared by the coordinator.
///
/// The coordinator allocates the event id and timestamp before entering
/// the store so that a retried operation is distinguishable in the log.
#[derive(Debug, Clone)]
pub struct SubmitOp {
    /// Identifier for the score event this submission creates.
    pub event_id: ScoreEventId,
    /// The submitting player.
    pub player_id: PlayerId,
    /// Score delta to fold into the aggregate. Non-negative.
    pub delta: Decimal,
    /// Game mode of the submission.
    pub game_mode: GameMode,
    /// Wall-clock time of the submission.
    pub occurred_at: DateTime<Utc>,
    /// Reported game duration in milliseconds.
    pub duration_ms: Option<u64>,
    /// Free-form metadata recorded on the event.
    pub metadata: Option<serde_json::Value>,
    /// Whether this submission counts as a win.
    pub won: bool,
}

/// The committed result of one submission.
#[derive(Debug, Clone)]
pub struct SubmitCommit {
    /// The event id that was appended.
    pub event_id: ScoreEventId,
    /// Display name of the player at commit time.
    pub display_name: String,
    /// The rank stored by the player's previous submission, if any.
    pub old_rank: Option<u64>,
    /// The freshly computed rank.
    pub new_rank: u64,
    /// Total score after the fold.
    pub new_total: Decimal,
    /// Games played after the fold.
    pub games_played: u32,
}

/// A page of ordered entries plus the size of the active set.
#[derive(Debug, Clone)]
pub struct TopSlice {
    /// The requested page, best first, ranks assigned by position.
    pub entries: Vec<LeaderboardEntry>,
    /// Total number of active entries on the board.
    pub total_count: u64,
}

/// Read/write primitives the engine requires from its storage collaborator.
///
/// Implementations must apply the same ordering everywhere: total score
/// descending, player id ascending (see [`crate::rank`]). An implementation
/// whose `top` and `rank_of` disagree on ties violates the contract.
pub trait LeaderboardStore: Send + Sync + 'static {
    /// Atomically append the score event, fold the delta into the player's
    /// aggregate, recompute that player's rank, and persist all of it.
    ///
    /// An inactive player (and their entry) is reactivated by this call.
    /// Fails with [`StoreError::PlayerNotFound`] if the player does not
    /// exist; no partial state persists on any failure.
    fn commit_submit(
        &self,
        op: SubmitOp,
    ) -> impl Future<Output = Result<SubmitCommit, StoreError>> + Send;

    /// Return the entry for `player` with its rank computed live against
    /// the current active set, or `None` if the player is unknown or
    /// inactive.
    fn rank_of(
        &self,
        player: PlayerId,
    ) -> impl Future<Output = Result<Option<LeaderboardEntry>, StoreError>> + Send;

    /// Return an ordered page of active entries and the active-set size.
    ///
    /// The page is a restartable projection: ranks are assigned by
    /// position (`offset + index + 1`), consistent with `rank_of`.
    fn top(
        &self,
        limit: u32,
        offset: u32,
    ) -> impl Future<Output = Result<TopSlice, StoreError>> + Send;

    /// Number of active entries on the board.
    fn active_count(&self) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Create or replace a player record. This is the seam used by the
    /// external profile collaborator (and by seeding/tests).
    fn register_player(
        &self,
        player: Player,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Flip a player's active flag, soft-(de)activating their entry.
    ///
    /// Deactivation removes the player from ranking without touching the
    /// event log; the entry row is preserved for audit continuity.
    fn set_player_active(
        &self,
        player: PlayerId,
        active: bool,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// All score events for a player, oldest first. Audit/read-only.
    fn events_for_player(
        &self,
        player: PlayerId,
    ) -> impl Future<Output = Result<Vec<ScoreEvent>, StoreError>> + Send;
}
