//! Shared application state for the leaderboard API server.
//!
//! [`AppState`] is a thin handle around the engine's coordinator. It is
//! generic over the storage and cache backends so the same router serves
//! the `PostgreSQL`/Redis stack in production and the in-memory stack in
//! tests.

use std::sync::Arc;

use tokio::sync::broadcast;

use podium_engine::{CacheBackend, Coordinator, LeaderboardStore};

/// Shared state for the Axum application.
///
/// Injected via Axum's `State` extractor. Cloning is cheap: the
/// coordinator lives behind an [`Arc`].
pub struct AppState<S, C> {
    /// The ranking engine behind every route.
    pub coordinator: Arc<Coordinator<S, C>>,
}

impl<S, C> Clone for AppState<S, C> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
        }
    }
}

impl<S, C> AppState<S, C>
where
    S: LeaderboardStore,
    C: CacheBackend,
{
    /// Wrap a coordinator for injection into the router.
    pub fn new(coordinator: Arc<Coordinator<S, C>>) -> Self {
        Self { coordinator }
    }

    /// Subscribe to the rank-change stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.coordinator.subscribe()
    }
}
