//! `PostgreSQL` implementation of the engine's storage contract.
//!
//! `commit_submit` runs as a single transaction with the player row
//! locked `FOR UPDATE`, so the event append, the aggregate fold, and the
//! rank write land atomically. Rank is computed by counting strictly
//! outranking active rows with the same ordering the read queries use:
//! total score descending, player id ascending.

use core::future::Future;

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use podium_engine::rank;
use podium_engine::store::{LeaderboardStore, StoreError, SubmitCommit, SubmitOp, TopSlice};
use podium_types::{LeaderboardEntry, Player, PlayerId, ScoreEvent};

use crate::error::DbError;
use crate::postgres::PostgresPool;
use crate::score_event_store::ScoreEventStore;

/// SQL predicate counting rows that strictly outrank `(total $1, id $2)`.
const OUTRANK_COUNT: &str = r"SELECT COUNT(*) FROM leaderboard
    WHERE is_active AND player_id <> $2
      AND (total_score > $1 OR (total_score = $1 AND player_id < $2))";

/// Leaderboard storage backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PgLeaderboardStore {
    pool: PgPool,
}

impl PgLeaderboardStore {
    /// Create a store over an established pool.
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }

    async fn submit_tx(&self, op: SubmitOp) -> Result<SubmitCommit, StoreError> {
        let mut tx = self.pool.begin().await.map_err(pg_err)?;

        let player = sqlx::query_as::<_, PlayerRow>(
            r"SELECT display_name, is_active FROM players WHERE id = $1 FOR UPDATE",
        )
        .bind(op.player_id.into_inner())
        .fetch_optional(&mut *tx)
        .await
        .map_err(pg_err)?
        .ok_or(StoreError::PlayerNotFound(op.player_id))?;

        if !player.is_active {
            sqlx::query(r"UPDATE players SET is_active = TRUE WHERE id = $1")
                .bind(op.player_id.into_inner())
                .execute(&mut *tx)
                .await
                .map_err(pg_err)?;
        }

        ScoreEventStore::append_in_tx(&mut tx, &op).await?;

        let existing = sqlx::query_as::<_, EntryRow>(
            r"SELECT player_id, display_name, total_score, rank, games_played, wins, win_rate, last_updated, is_active
              FROM leaderboard WHERE player_id = $1 FOR UPDATE",
        )
        .bind(op.player_id.into_inner())
        .fetch_optional(&mut *tx)
        .await
        .map_err(pg_err)?
        .map(EntryRow::into_entry);

        let (old_rank, new_total, games_played, wins) = match existing {
            Some(entry) => (
                entry.active.then_some(entry.rank),
                entry.total_score.saturating_add(op.delta),
                entry.games_played.saturating_add(1),
                if op.won {
                    entry.wins.saturating_add(1)
                } else {
                    entry.wins
                },
            ),
            None => (None, op.delta, 1, u32::from(op.won)),
        };
        let win_rate = rank::win_rate(wins, games_played);

        let outranked: i64 = sqlx::query_scalar(OUTRANK_COUNT)
            .bind(new_total)
            .bind(op.player_id.into_inner())
            .fetch_one(&mut *tx)
            .await
            .map_err(pg_err)?;
        let new_rank = rank::rank_from_outranked(u64::try_from(outranked).unwrap_or(0));

        sqlx::query(
            r"INSERT INTO leaderboard (player_id, display_name, total_score, rank, games_played, wins, win_rate, last_updated, is_active)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE)
              ON CONFLICT (player_id) DO UPDATE SET
                  total_score = EXCLUDED.total_score,
                  rank = EXCLUDED.rank,
                  games_played = EXCLUDED.games_played,
                  wins = EXCLUDED.wins,
                  win_rate = EXCLUDED.win_rate,
                  last_updated = EXCLUDED.last_updated,
                  is_active = TRUE",
        )
        .bind(op.player_id.into_inner())
        .bind(&player.display_name)
        .bind(new_total)
        .bind(i64::try_from(new_rank).unwrap_or(i64::MAX))
        .bind(i32::try_from(games_played).unwrap_or(i32::MAX))
        .bind(i32::try_from(wins).unwrap_or(i32::MAX))
        .bind(win_rate)
        .bind(op.occurred_at)
        .execute(&mut *tx)
        .await
        .map_err(pg_err)?;

        tx.commit().await.map_err(pg_err)?;

        Ok(SubmitCommit {
            event_id: op.event_id,
            display_name: player.display_name,
            old_rank,
            new_rank,
            new_total,
            games_played,
        })
    }

    async fn fetch_rank(&self, player: PlayerId) -> Result<Option<LeaderboardEntry>, StoreError> {
        let row = sqlx::query_as::<_, EntryRow>(
            r"SELECT player_id, display_name, total_score, rank, games_played, wins, win_rate, last_updated, is_active
              FROM leaderboard WHERE player_id = $1 AND is_active",
        )
        .bind(player.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(pg_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut entry = row.into_entry();

        let outranked: i64 = sqlx::query_scalar(OUTRANK_COUNT)
            .bind(entry.total_score)
            .bind(player.into_inner())
            .fetch_one(&self.pool)
            .await
            .map_err(pg_err)?;
        entry.rank = rank::rank_from_outranked(u64::try_from(outranked).unwrap_or(0));

        Ok(Some(entry))
    }

    async fn fetch_top(&self, limit: u32, offset: u32) -> Result<TopSlice, StoreError> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r"SELECT player_id, display_name, total_score, rank, games_played, wins, win_rate, last_updated, is_active
              FROM leaderboard
              WHERE is_active
              ORDER BY total_score DESC, player_id ASC
              LIMIT $1 OFFSET $2",
        )
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(pg_err)?;

        let total_count = self.count_active().await?;

        let mut entries: Vec<LeaderboardEntry> =
            rows.into_iter().map(EntryRow::into_entry).collect();
        rank::assign_ranks(&mut entries, u64::from(offset));

        Ok(TopSlice {
            entries,
            total_count,
        })
    }

    async fn count_active(&self) -> Result<u64, StoreError> {
        let count: i64 =
            sqlx::query_scalar(r"SELECT COUNT(*) FROM leaderboard WHERE is_active")
                .fetch_one(&self.pool)
                .await
                .map_err(pg_err)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn upsert_player(&self, player: Player) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(pg_err)?;

        sqlx::query(
            r"INSERT INTO players (id, display_name, is_active, joined_at)
              VALUES ($1, $2, $3, $4)
              ON CONFLICT (id) DO UPDATE SET
                  display_name = EXCLUDED.display_name,
                  is_active = EXCLUDED.is_active",
        )
        .bind(player.id.into_inner())
        .bind(&player.display_name)
        .bind(player.active)
        .bind(player.joined_at)
        .execute(&mut *tx)
        .await
        .map_err(pg_err)?;

        // Keep the denormalized name in step with the player record.
        sqlx::query(r"UPDATE leaderboard SET display_name = $2 WHERE player_id = $1")
            .bind(player.id.into_inner())
            .bind(&player.display_name)
            .execute(&mut *tx)
            .await
            .map_err(pg_err)?;

        tx.commit().await.map_err(pg_err)?;
        Ok(())
    }

    async fn flip_active(&self, player: PlayerId, active: bool) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(pg_err)?;

        let updated = sqlx::query(r"UPDATE players SET is_active = $2 WHERE id = $1")
            .bind(player.into_inner())
            .bind(active)
            .execute(&mut *tx)
            .await
            .map_err(pg_err)?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::PlayerNotFound(player));
        }

        sqlx::query(
            r"UPDATE leaderboard SET is_active = $2, last_updated = NOW() WHERE player_id = $1",
        )
        .bind(player.into_inner())
        .bind(active)
        .execute(&mut *tx)
        .await
        .map_err(pg_err)?;

        tx.commit().await.map_err(pg_err)?;
        Ok(())
    }

    async fn fetch_events(&self, player: PlayerId) -> Result<Vec<ScoreEvent>, StoreError> {
        let store = ScoreEventStore::new(&self.pool);
        Ok(store.get_by_player(player.into_inner()).await?)
    }

    /// Recompute and persist the stored rank of every active entry in one
    /// statement.
    ///
    /// The serving path never reads the stored column (ranks are computed
    /// live or assigned by page position), so this is an operational
    /// repair for drift after manual data changes, not part of the
    /// submission path. Returns the number of rows updated.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the update fails.
    pub async fn repair_ranks(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r"UPDATE leaderboard AS l SET rank = ranked.fresh_rank
              FROM (
                  SELECT player_id,
                         ROW_NUMBER() OVER (ORDER BY total_score DESC, player_id ASC) AS fresh_rank
                  FROM leaderboard
                  WHERE is_active
              ) AS ranked
              WHERE l.player_id = ranked.player_id",
        )
        .execute(&self.pool)
        .await
        .map_err(pg_err)?;
        Ok(result.rows_affected())
    }
}

impl LeaderboardStore for PgLeaderboardStore {
    fn commit_submit(
        &self,
        op: SubmitOp,
    ) -> impl Future<Output = Result<SubmitCommit, StoreError>> + Send {
        self.submit_tx(op)
    }

    fn rank_of(
        &self,
        player: PlayerId,
    ) -> impl Future<Output = Result<Option<LeaderboardEntry>, StoreError>> + Send {
        self.fetch_rank(player)
    }

    fn top(
        &self,
        limit: u32,
        offset: u32,
    ) -> impl Future<Output = Result<TopSlice, StoreError>> + Send {
        self.fetch_top(limit, offset)
    }

    fn active_count(&self) -> impl Future<Output = Result<u64, StoreError>> + Send {
        self.count_active()
    }

    fn register_player(
        &self,
        player: Player,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.upsert_player(player)
    }

    fn set_player_active(
        &self,
        player: PlayerId,
        active: bool,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.flip_active(player, active)
    }

    fn events_for_player(
        &self,
        player: PlayerId,
    ) -> impl Future<Output = Result<Vec<ScoreEvent>, StoreError>> + Send {
        self.fetch_events(player)
    }
}

/// The subset of a `players` row the submission path needs.
#[derive(Debug, Clone, sqlx::FromRow)]
struct PlayerRow {
    display_name: String,
    is_active: bool,
}

/// A row from the `leaderboard` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct EntryRow {
    player_id: Uuid,
    display_name: String,
    total_score: Decimal,
    rank: i64,
    games_played: i32,
    wins: i32,
    win_rate: Decimal,
    last_updated: chrono::DateTime<chrono::Utc>,
    is_active: bool,
}

impl EntryRow {
    fn into_entry(self) -> LeaderboardEntry {
        LeaderboardEntry {
            player_id: self.player_id.into(),
            display_name: self.display_name,
            total_score: self.total_score,
            rank: u64::try_from(self.rank).unwrap_or(0),
            games_played: u32::try_from(self.games_played).unwrap_or(0),
            wins: u32::try_from(self.wins).unwrap_or(0),
            win_rate: self.win_rate,
            last_updated: self.last_updated,
            active: self.is_active,
        }
    }
}

/// Collapse a [`sqlx::Error`] into the engine's backend error.
fn pg_err(err: sqlx::Error) -> StoreError {
    StoreError::from(DbError::Postgres(err))
}
