//! In-memory leaderboard store.
//!
//! Backs the engine in tests and single-process deployments. All state
//! lives behind one [`RwLock`], so `commit_submit` is trivially atomic:
//! the write guard covers the event append, the aggregate fold, and the
//! rank write. Readers take the read guard and therefore see either the
//! pre-commit or post-commit state, never a torn one.

use std::collections::BTreeMap;

use chrono::Utc;
use tokio::sync::RwLock;

use podium_types::{LeaderboardEntry, Player, PlayerId, ScoreEvent};

use crate::rank;
use crate::store::{LeaderboardStore, StoreError, SubmitCommit, SubmitOp, TopSlice};

/// Mutable leaderboard state, guarded as a single unit.
#[derive(Debug, Default)]
struct MemoryState {
    /// Player records keyed by id.
    players: BTreeMap<PlayerId, Player>,
    /// Aggregate entries keyed by player id.
    entries: BTreeMap<PlayerId, LeaderboardEntry>,
    /// Append-only event log, insertion order.
    events: Vec<ScoreEvent>,
}

impl MemoryState {
    /// Live rank of `(total, player)` against the current active set,
    /// excluding the player itself.
    fn live_rank(&self, player: PlayerId, total: rust_decimal::Decimal) -> u64 {
        let outranked = self
            .entries
            .values()
            .filter(|e| e.active && e.player_id != player)
            .filter(|e| rank::outranks(e.total_score, e.player_id, total, player))
            .count();
        rank::rank_from_outranked(u64::try_from(outranked).unwrap_or(u64::MAX))
    }

    /// Number of active entries.
    fn active_count(&self) -> u64 {
        let count = self.entries.values().filter(|e| e.active).count();
        u64::try_from(count).unwrap_or(u64::MAX)
    }
}

/// A [`LeaderboardStore`] backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeaderboardStore for MemoryStore {
    fn commit_submit(
        &self,
        op: SubmitOp,
    ) -> impl core::future::Future<Output = Result<SubmitCommit, StoreError>> + Send {
        async move {
            let mut state = self.state.write().await;

            let display_name = {
                let player = state
                    .players
                    .get_mut(&op.player_id)
                    .ok_or(StoreError::PlayerNotFound(op.player_id))?;
                // Submission reactivates an inactive player.
                player.active = true;
                player.display_name.clone()
            };

            let (old_rank, new_total, games_played, wins) = match state.entries.get(&op.player_id)
            {
                Some(existing) => (
                    existing.active.then_some(existing.rank),
                    existing.total_score.saturating_add(op.delta),
                    existing.games_played.saturating_add(1),
                    if op.won {
                        existing.wins.saturating_add(1)
                    } else {
                        existing.wins
                    },
                ),
                None => (None, op.delta, 1, u32::from(op.won)),
            };

            let new_rank = state.live_rank(op.player_id, new_total);

            let entry = LeaderboardEntry {
                player_id: op.player_id,
                display_name: display_name.clone(),
                total_score: new_total,
                rank: new_rank,
                games_played,
                wins,
                win_rate: rank::win_rate(wins, games_played),
                last_updated: op.occurred_at,
                active: true,
            };
            state.entries.insert(op.player_id, entry);

            state.events.push(ScoreEvent {
                id: op.event_id,
                player_id: op.player_id,
                delta: op.delta,
                game_mode: op.game_mode,
                occurred_at: op.occurred_at,
                duration_ms: op.duration_ms,
                metadata: op.metadata,
            });

            Ok(SubmitCommit {
                event_id: op.event_id,
                display_name,
                old_rank,
                new_rank,
                new_total,
                games_played,
            })
        }
    }

    fn rank_of(
        &self,
        player: PlayerId,
    ) -> impl core::future::Future<Output = Result<Option<LeaderboardEntry>, StoreError>> + Send
    {
        async move {
            let state = self.state.read().await;
            let Some(entry) = state.entries.get(&player).filter(|e| e.active) else {
                return Ok(None);
            };
            let mut entry = entry.clone();
            entry.rank = state.live_rank(player, entry.total_score);
            Ok(Some(entry))
        }
    }

    fn top(
        &self,
        limit: u32,
        offset: u32,
    ) -> impl core::future::Future<Output = Result<TopSlice, StoreError>> + Send {
        async move {
            let state = self.state.read().await;
            let mut active: Vec<LeaderboardEntry> = state
                .entries
                .values()
                .filter(|e| e.active)
                .cloned()
                .collect();
            active.sort_by(rank::compare_entries);

            let total_count = u64::try_from(active.len()).unwrap_or(u64::MAX);
            let mut entries: Vec<LeaderboardEntry> = active
                .into_iter()
                .skip(usize::try_from(offset).unwrap_or(usize::MAX))
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect();
            rank::assign_ranks(&mut entries, u64::from(offset));

            Ok(TopSlice {
                entries,
                total_count,
            })
        }
    }

    fn active_count(
        &self,
    ) -> impl core::future::Future<Output = Result<u64, StoreError>> + Send {
        async move {
            let state = self.state.read().await;
            Ok(state.active_count())
        }
    }

    fn register_player(
        &self,
        player: Player,
    ) -> impl core::future::Future<Output = Result<(), StoreError>> + Send {
        async move {
            let mut state = self.state.write().await;
            // Keep the denormalized name in step with the player record.
            if let Some(entry) = state.entries.get_mut(&player.id) {
                entry.display_name.clone_from(&player.display_name);
            }
            state.players.insert(player.id, player);
            Ok(())
        }
    }

    fn set_player_active(
        &self,
        player: PlayerId,
        active: bool,
    ) -> impl core::future::Future<Output = Result<(), StoreError>> + Send {
        async move {
            let mut state = self.state.write().await;
            let record = state
                .players
                .get_mut(&player)
                .ok_or(StoreError::PlayerNotFound(player))?;
            record.active = active;
            if let Some(entry) = state.entries.get_mut(&player) {
                entry.active = active;
                entry.last_updated = Utc::now();
            }
            Ok(())
        }
    }

    fn events_for_player(
        &self,
        player: PlayerId,
    ) -> impl core::future::Future<Output = Result<Vec<ScoreEvent>, StoreError>> + Send {
        async move {
            let state = self.state.read().await;
            Ok(state
                .events
                .iter()
                .filter(|e| e.player_id == player)
                .cloned()
                .collect())
        }
    }
}
