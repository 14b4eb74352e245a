//! Submission coordinator: the single write path into the leaderboard.
//!
//! All submissions pass through one ordering lock, so commits are
//! strictly serialized and every rank computation sees a settled board.
//! The wait for the lock is bounded; a submission that cannot acquire it
//! in time fails with [`EngineError::Conflict`] rather than queueing
//! unboundedly, and the engine never retries on the caller's behalf.
//!
//! After a commit the coordinator publishes the rank change to the
//! broadcast fan-out and spawns cache invalidation. Neither is on the
//! submission's critical path: a fan-out with no subscribers and a cache
//! that cannot be reached both leave the receipt unaffected.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, broadcast};
use tokio::time::timeout;

use podium_types::{
    ChangeEvent, HealthStatus, Player, PlayerId, RankView, ScoreEvent, ScoreEventId, StreamMessage,
    SubmitReceipt, SubmitRequest, TopPage,
};
use validator::Validate;

use crate::broadcast::BroadcastManager;
use crate::cache::{CacheBackend, CacheKey, CacheLayer, CachePrefix, CacheTtls};
use crate::error::EngineError;
use crate::rank;
use crate::store::{LeaderboardStore, SubmitOp};

/// Largest page size `top` will serve.
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Tuning knobs for a [`Coordinator`].
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// Bounded wait for the ordering lock before failing with conflict.
    pub lock_timeout: Duration,
    /// Per-subscriber buffer of the broadcast channel.
    pub broadcast_capacity: usize,
    /// Number of entries in the stream snapshot.
    pub snapshot_limit: u32,
    /// Cache TTL policy.
    pub cache_ttls: CacheTtls,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(2),
            broadcast_capacity: crate::broadcast::DEFAULT_CAPACITY,
            snapshot_limit: 100,
            cache_ttls: CacheTtls::default(),
        }
    }
}

/// The ranking engine's public face: serialized writes, cached reads,
/// and the broadcast stream.
#[derive(Debug)]
pub struct Coordinator<S, C> {
    store: S,
    cache: CacheLayer<C>,
    broadcaster: BroadcastManager,
    ordering_lock: Mutex<()>,
    lock_timeout: Duration,
    snapshot_limit: u32,
}

impl<S, C> Coordinator<S, C>
where
    S: LeaderboardStore,
    C: CacheBackend,
{
    /// Assemble a coordinator over a store and a cache backend.
    pub fn new(store: S, cache_backend: C, config: CoordinatorConfig) -> Self {
        Self {
            store,
            cache: CacheLayer::new(cache_backend, config.cache_ttls),
            broadcaster: BroadcastManager::new(config.broadcast_capacity),
            ordering_lock: Mutex::new(()),
            lock_timeout: config.lock_timeout,
            snapshot_limit: config.snapshot_limit,
        }
    }

    /// Submit a score: validate, commit under the ordering lock, publish
    /// the rank change, and schedule cache invalidation.
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitReceipt, EngineError> {
        request
            .validate()
            .map_err(|err| EngineError::InvalidInput(err.to_string()))?;

        let won = request
            .metadata
            .as_ref()
            .and_then(|meta| meta.get("won"))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        let op = SubmitOp {
            event_id: ScoreEventId::new(),
            player_id: request.player_id,
            delta: request.score,
            game_mode: request.game_mode,
            occurred_at: Utc::now(),
            duration_ms: request.duration_ms,
            metadata: request.metadata,
            won,
        };

        let commit = {
            let Ok(_guard) = timeout(self.lock_timeout, self.ordering_lock.lock()).await else {
                return Err(EngineError::Conflict(format!(
                    "submission lock not acquired within {:?}",
                    self.lock_timeout
                )));
            };
            self.store.commit_submit(op).await?
        };

        let rank_delta = match commit.old_rank {
            Some(old) => i64::try_from(old)
                .unwrap_or(i64::MAX)
                .saturating_sub(i64::try_from(commit.new_rank).unwrap_or(i64::MAX)),
            None => 0,
        };

        let change = ChangeEvent {
            player_id: request.player_id,
            display_name: commit.display_name,
            old_rank: commit.old_rank,
            new_rank: commit.new_rank,
            new_total: commit.new_total,
            rank_delta,
            timestamp: Utc::now(),
        };
        if let Err(err) = self.broadcaster.publish(&change) {
            tracing::warn!(player_id = %change.player_id, error = %err, "rank change not published");
        }

        // Off the critical path: stale entries are deleted in the
        // background and bounded by TTL if the task fails.
        let cache = self.cache.clone();
        tokio::spawn(async move {
            cache.invalidate_prefix(CachePrefix::Top).await;
            cache.invalidate_prefix(CachePrefix::Rank).await;
            cache.invalidate_prefix(CachePrefix::Snapshot).await;
        });

        tracing::info!(
            player_id = %request.player_id,
            event_id = %commit.event_id,
            new_rank = commit.new_rank,
            rank_delta,
            "score committed"
        );

        Ok(SubmitReceipt {
            event_id: commit.event_id,
            player_id: request.player_id,
            score: request.score,
            new_total: commit.new_total,
            new_rank: commit.new_rank,
            rank_delta,
            message: receipt_message(commit.new_rank, rank_delta),
        })
    }

    /// A cached page of the leaderboard, best first.
    pub async fn top(&self, limit: u32, offset: u32) -> Result<TopPage, EngineError> {
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(EngineError::InvalidInput(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}, got {limit}"
            )));
        }
        self.cache
            .get_or_compute(CacheKey::Top { limit, offset }, || async move {
                let slice = self.store.top(limit, offset).await?;
                Ok(TopPage {
                    entries: slice.entries,
                    total_count: slice.total_count,
                    as_of: Utc::now(),
                })
            })
            .await
    }

    /// A cached rank view for one player.
    pub async fn rank_of(&self, player: PlayerId) -> Result<RankView, EngineError> {
        self.cache
            .get_or_compute(CacheKey::Rank(player), || self.compute_rank_view(player))
            .await
    }

    async fn compute_rank_view(&self, player: PlayerId) -> Result<RankView, EngineError> {
        let entry = self
            .store
            .rank_of(player)
            .await?
            .ok_or(EngineError::NotFound(player))?;
        let active = self.store.active_count().await?;
        Ok(RankView {
            player_id: entry.player_id,
            display_name: entry.display_name,
            rank: entry.rank,
            total_score: entry.total_score,
            games_played: entry.games_played,
            win_rate: entry.win_rate,
            percentile: rank::percentile(entry.rank, active),
            as_of: Utc::now(),
        })
    }

    /// The cached snapshot sent to each new stream connection.
    pub async fn snapshot(&self) -> Result<StreamMessage, EngineError> {
        let limit = self.snapshot_limit;
        self.cache
            .get_or_compute(CacheKey::SnapshotAll, || async move {
                let slice = self.store.top(limit, 0).await?;
                Ok(StreamMessage::Snapshot {
                    entries: slice.entries,
                    timestamp: Utc::now(),
                })
            })
            .await
    }

    /// Open a subscription to the rank-change stream.
    pub fn subscribe(&self) -> broadcast::Receiver<std::sync::Arc<str>> {
        self.broadcaster.subscribe()
    }

    /// Number of live stream subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.receiver_count()
    }

    /// Engine liveness plus cache reachability.
    pub async fn health(&self) -> HealthStatus {
        HealthStatus {
            ok: true,
            cache_reachable: self.cache.ping().await,
        }
    }

    /// Create or replace a player record.
    pub async fn register_player(&self, player: Player) -> Result<(), EngineError> {
        Ok(self.store.register_player(player).await?)
    }

    /// Soft-(de)activate a player and their entry.
    pub async fn set_player_active(
        &self,
        player: PlayerId,
        active: bool,
    ) -> Result<(), EngineError> {
        self.store.set_player_active(player, active).await?;
        // Direct state change outside a submission; drop derived views now.
        self.cache.invalidate_prefix(CachePrefix::Top).await;
        self.cache.invalidate_prefix(CachePrefix::Rank).await;
        self.cache.invalidate_prefix(CachePrefix::Snapshot).await;
        Ok(())
    }

    /// The audit trail for a player, oldest first.
    pub async fn events_for_player(
        &self,
        player: PlayerId,
    ) -> Result<Vec<ScoreEvent>, EngineError> {
        Ok(self.store.events_for_player(player).await?)
    }
}

/// Human-readable rank-change summary for a receipt.
fn receipt_message(new_rank: u64, rank_delta: i64) -> String {
    if rank_delta > 0 {
        format!("Score submitted! New rank: {new_rank} (\u{2191}{rank_delta})")
    } else if rank_delta < 0 {
        format!(
            "Score submitted! New rank: {new_rank} (\u{2193}{})",
            rank_delta.saturating_abs()
        )
    } else {
        format!("Score submitted! New rank: {new_rank}")
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use podium_types::GameMode;

    use crate::cache::MemoryCache;
    use crate::memory::MemoryStore;

    use super::*;

    fn coordinator() -> Coordinator<MemoryStore, MemoryCache> {
        Coordinator::new(
            MemoryStore::new(),
            MemoryCache::new(),
            CoordinatorConfig::default(),
        )
    }

    async fn register(c: &Coordinator<MemoryStore, MemoryCache>, name: &str) -> PlayerId {
        let player = Player {
            id: PlayerId::new(),
            display_name: String::from(name),
            active: true,
            joined_at: Utc::now(),
        };
        let id = player.id;
        c.register_player(player).await.ok();
        id
    }

    fn request(player: PlayerId, score: i64) -> SubmitRequest {
        SubmitRequest {
            player_id: player,
            score: Decimal::new(score, 0),
            game_mode: GameMode::Ranked,
            duration_ms: Some(30_000),
            metadata: None,
        }
    }

    async fn drain_invalidation() {
        for _ in 0..4_u8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn unknown_player_is_rejected_without_state_change() {
        let c = coordinator();
        let result = c.submit(request(PlayerId::new(), 100)).await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));

        let page = c.top(10, 0).await.ok();
        assert!(matches!(page, Some(p) if p.entries.is_empty() && p.total_count == 0));
    }

    #[tokio::test]
    async fn negative_score_is_invalid_input() {
        let c = coordinator();
        let player = register(&c, "ada").await;
        let result = c.submit(request(player, -5)).await;
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn climbing_submission_reports_positive_delta() {
        let c = coordinator();
        let first = register(&c, "first").await;
        let second = register(&c, "second").await;

        c.submit(request(first, 1000)).await.ok();
        c.submit(request(second, 400)).await.ok();

        // Second player overtakes: rank 2 -> 1.
        let receipt = c.submit(request(second, 700)).await.ok();
        assert!(matches!(
            receipt,
            Some(r)
                if r.new_rank == 1
                    && r.rank_delta == 1
                    && r.message == "Score submitted! New rank: 1 (\u{2191}1)"
        ));
    }

    #[tokio::test]
    async fn overtaken_player_drops_one_rank() {
        let c = coordinator();
        let leader = register(&c, "leader").await;
        let chaser = register(&c, "chaser").await;

        c.submit(request(leader, 500)).await.ok();
        c.submit(request(chaser, 800)).await.ok();
        drain_invalidation().await;

        let view = c.rank_of(leader).await.ok();
        assert!(matches!(view, Some(v) if v.rank == 2));
    }

    #[tokio::test]
    async fn totals_conserve_event_deltas() {
        let c = coordinator();
        let player = register(&c, "ada").await;

        for score in [100, 250, 0, 650] {
            c.submit(request(player, score)).await.ok();
        }
        drain_invalidation().await;

        let view = c.rank_of(player).await.ok();
        assert!(matches!(&view, Some(v) if v.total_score == Decimal::new(1000, 0)));

        let events = c.events_for_player(player).await.unwrap_or_default();
        let replayed = events
            .iter()
            .fold(Decimal::ZERO, |acc, e| acc.saturating_add(e.delta));
        assert_eq!(replayed, Decimal::new(1000, 0));
    }

    #[tokio::test]
    async fn top_page_ranks_are_gap_free() {
        let c = coordinator();
        for (name, score) in [("a", 300), ("b", 300), ("c", 100), ("d", 500)] {
            let id = register(&c, name).await;
            c.submit(request(id, score)).await.ok();
        }
        drain_invalidation().await;

        let page = c.top(10, 0).await.ok();
        let Some(page) = page else {
            return assert!(false, "top query failed");
        };
        let ranks: Vec<u64> = page.entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn tied_totals_order_deterministically() {
        let c = coordinator();
        let a = register(&c, "a").await;
        let b = register(&c, "b").await;
        c.submit(request(a, 500)).await.ok();
        c.submit(request(b, 500)).await.ok();
        drain_invalidation().await;

        let page = c.top(10, 0).await.ok();
        let Some(page) = page else {
            return assert!(false, "top query failed");
        };
        let ids: Vec<PlayerId> = page.entries.iter().map(|e| e.player_id).collect();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn submission_invalidates_cached_reads() {
        let c = coordinator();
        let player = register(&c, "ada").await;

        c.submit(request(player, 100)).await.ok();
        drain_invalidation().await;
        let before = c.top(10, 0).await.ok();

        c.submit(request(player, 900)).await.ok();
        drain_invalidation().await;
        let after = c.top(10, 0).await.ok();

        let totals = |page: Option<TopPage>| {
            page.and_then(|p| p.entries.first().map(|e| e.total_score))
        };
        assert_eq!(totals(before), Some(Decimal::new(100, 0)));
        assert_eq!(totals(after), Some(Decimal::new(1000, 0)));
    }

    #[tokio::test]
    async fn subscriber_receives_published_change() {
        let c = coordinator();
        let player = register(&c, "ada").await;
        let mut rx = c.subscribe();

        c.submit(request(player, 250)).await.ok();

        let Ok(payload) = rx.recv().await else {
            return assert!(false, "no broadcast received");
        };
        let message: Result<StreamMessage, _> = serde_json::from_str(&payload);
        assert!(matches!(
            message,
            Ok(StreamMessage::Update { new_rank: 1, .. })
        ));
    }

    #[tokio::test]
    async fn page_limit_is_bounded() {
        let c = coordinator();
        assert!(matches!(
            c.top(0, 0).await,
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            c.top(MAX_PAGE_LIMIT.saturating_add(1), 0).await,
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn deactivated_player_is_not_found_then_reactivates() {
        let c = coordinator();
        let player = register(&c, "ada").await;
        c.submit(request(player, 500)).await.ok();
        drain_invalidation().await;

        c.set_player_active(player, false).await.ok();
        assert!(matches!(
            c.rank_of(player).await,
            Err(EngineError::NotFound(_))
        ));

        c.submit(request(player, 100)).await.ok();
        drain_invalidation().await;
        let view = c.rank_of(player).await.ok();
        assert!(matches!(view, Some(v) if v.total_score == Decimal::new(600, 0)));
    }

    #[tokio::test]
    async fn win_metadata_feeds_win_rate() {
        let c = coordinator();
        let player = register(&c, "ada").await;

        let mut won = request(player, 100);
        won.metadata = Some(serde_json::json!({"won": true}));
        c.submit(won).await.ok();
        c.submit(request(player, 100)).await.ok();
        drain_invalidation().await;

        let view = c.rank_of(player).await.ok();
        assert!(matches!(
            view,
            Some(v) if v.games_played == 2 && v.win_rate == Decimal::new(5, 1)
        ));
    }

    #[tokio::test]
    async fn every_subscriber_receives_every_submission_update() {
        let c = coordinator();
        let player = register(&c, "ada").await;
        let mut rx_a = c.subscribe();
        let mut rx_b = c.subscribe();

        for score in [100, 200, 300] {
            c.submit(request(player, score)).await.ok();
        }

        let expected = vec![
            Decimal::new(100, 0),
            Decimal::new(300, 0),
            Decimal::new(600, 0),
        ];
        for rx in [&mut rx_a, &mut rx_b] {
            let mut totals = Vec::new();
            for _ in 0..3_u8 {
                let Ok(payload) = rx.recv().await else {
                    return assert!(false, "missing update");
                };
                let message: Result<StreamMessage, _> = serde_json::from_str(&payload);
                if let Ok(StreamMessage::Update { total_score, .. }) = message {
                    totals.push(total_score);
                }
            }
            assert_eq!(totals, expected);
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn concurrent_submissions_settle_to_distinct_ranks() {
        let c = std::sync::Arc::new(coordinator());
        let a = register(&c, "a").await;
        let b = register(&c, "b").await;

        let c_a = std::sync::Arc::clone(&c);
        let c_b = std::sync::Arc::clone(&c);
        let first = tokio::spawn(async move { c_a.submit(request(a, 300)).await });
        let second = tokio::spawn(async move { c_b.submit(request(b, 300)).await });
        assert!(matches!(first.await, Ok(Ok(_))));
        assert!(matches!(second.await, Ok(Ok(_))));
        drain_invalidation().await;

        let page = c.top(10, 0).await.ok();
        let Some(page) = page else {
            return assert!(false, "top query failed");
        };
        let ranks: Vec<u64> = page.entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2]);
    }

    #[tokio::test]
    async fn concurrent_same_player_submissions_conserve_total() {
        let c = std::sync::Arc::new(coordinator());
        let player = register(&c, "ada").await;

        let mut handles = Vec::new();
        for score in [100, 200, 300, 400] {
            let c = std::sync::Arc::clone(&c);
            handles.push(tokio::spawn(
                async move { c.submit(request(player, score)).await },
            ));
        }
        for handle in handles {
            assert!(matches!(handle.await, Ok(Ok(_))));
        }
        drain_invalidation().await;

        let view = c.rank_of(player).await.ok();
        assert!(matches!(view, Some(v) if v.total_score == Decimal::new(1000, 0)));

        let events = c.events_for_player(player).await.unwrap_or_default();
        assert_eq!(events.len(), 4);
    }

    #[tokio::test]
    async fn late_subscriber_sees_only_later_changes() {
        let c = coordinator();
        let early = register(&c, "early").await;
        let late = register(&c, "late").await;

        c.submit(request(early, 500)).await.ok();
        drain_invalidation().await;

        // Connect order mirrors the stream handler: subscribe first,
        // then take the snapshot.
        let mut rx = c.subscribe();
        let snapshot = c.snapshot().await.ok();
        assert!(matches!(
            &snapshot,
            Some(StreamMessage::Snapshot { entries, .. }) if entries.len() == 1
        ));

        c.submit(request(late, 900)).await.ok();
        let Ok(payload) = rx.recv().await else {
            return assert!(false, "no broadcast received");
        };
        let message: Result<StreamMessage, _> = serde_json::from_str(&payload);
        assert!(matches!(
            message,
            Ok(StreamMessage::Update { player_id, .. }) if player_id == late
        ));
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn snapshot_is_bounded_by_configured_limit() {
        let store = MemoryStore::new();
        let c = Coordinator::new(
            store,
            MemoryCache::new(),
            CoordinatorConfig {
                snapshot_limit: 2,
                ..CoordinatorConfig::default()
            },
        );
        for (name, score) in [("a", 100), ("b", 200), ("c", 300)] {
            let id = register(&c, name).await;
            c.submit(request(id, score)).await.ok();
        }
        drain_invalidation().await;

        let snapshot = c.snapshot().await.ok();
        assert!(matches!(
            snapshot,
            Some(StreamMessage::Snapshot { entries, .. }) if entries.len() == 2
        ));
    }
}
