//! Append-only persistence for the score event log.
//!
//! The `score_events` table is the audit trail: rows are inserted exactly
//! once per committed submission and never updated or deleted, so the
//! leaderboard aggregates can always be checked against a replay of the
//! log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use podium_engine::SubmitOp;
use podium_types::{GameMode, ScoreEvent};

use crate::error::DbError;

/// Operations on the `score_events` table.
pub struct ScoreEventStore<'a> {
    pool: &'a PgPool,
}

impl<'a> ScoreEventStore<'a> {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append one score event inside an already-open transaction.
    ///
    /// The leaderboard store calls this so the event append commits or
    /// rolls back together with the aggregate fold.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn append_in_tx(conn: &mut PgConnection, op: &SubmitOp) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO score_events (id, player_id, delta, game_mode, occurred_at, duration_ms, metadata)
              VALUES ($1, $2, $3, $4::game_mode, $5, $6, $7)",
        )
        .bind(op.event_id.into_inner())
        .bind(op.player_id.into_inner())
        .bind(op.delta)
        .bind(op.game_mode.as_str())
        .bind(op.occurred_at)
        .bind(op.duration_ms.map(|d| i64::try_from(d).unwrap_or(i64::MAX)))
        .bind(op.metadata.as_ref())
        .execute(conn)
        .await?;
        Ok(())
    }

    /// All events for a player, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get_by_player(&self, player_id: Uuid) -> Result<Vec<ScoreEvent>, DbError> {
        let rows = sqlx::query_as::<_, ScoreEventRow>(
            r"SELECT id, player_id, delta, game_mode::TEXT AS game_mode, occurred_at, duration_ms, metadata
              FROM score_events
              WHERE player_id = $1
              ORDER BY occurred_at, id",
        )
        .bind(player_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(ScoreEventRow::into_event).collect())
    }

    /// Total number of events in the log.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn count(&self) -> Result<u64, DbError> {
        let count: i64 = sqlx::query_scalar(r"SELECT COUNT(*) FROM score_events")
            .fetch_one(self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

/// A row from the `score_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ScoreEventRow {
    id: Uuid,
    player_id: Uuid,
    delta: Decimal,
    /// Game mode as a string (cast from the `PostgreSQL` enum).
    game_mode: String,
    occurred_at: DateTime<Utc>,
    duration_ms: Option<i64>,
    metadata: Option<serde_json::Value>,
}

impl ScoreEventRow {
    fn into_event(self) -> ScoreEvent {
        ScoreEvent {
            id: self.id.into(),
            player_id: self.player_id.into(),
            delta: self.delta,
            game_mode: GameMode::parse(&self.game_mode).unwrap_or_default(),
            occurred_at: self.occurred_at,
            duration_ms: self
                .duration_ms
                .map(|d| u64::try_from(d).unwrap_or_default()),
            metadata: self.metadata,
        }
    }
}
