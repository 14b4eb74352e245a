//! Axum router construction for the leaderboard API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use podium_engine::{CacheBackend, LeaderboardStore};

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the leaderboard server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws/leaderboard` -- `WebSocket` snapshot + rank-change stream
/// - `POST /api/leaderboard/submit` -- score submission
/// - `GET /api/leaderboard/top` -- paginated top-N view
/// - `GET /api/leaderboard/rank/:player_id` -- single-player rank detail
/// - `GET /api/leaderboard/health` -- engine + cache health
///
/// CORS is configured to allow any origin for development. In
/// production this should be restricted.
pub fn build_router<S, C>(state: AppState<S, C>) -> Router
where
    S: LeaderboardStore,
    C: CacheBackend,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index::<S, C>))
        // WebSocket
        .route("/ws/leaderboard", get(ws::ws_leaderboard::<S, C>))
        // REST API
        .route("/api/leaderboard/submit", post(handlers::submit::<S, C>))
        .route("/api/leaderboard/top", get(handlers::top::<S, C>))
        .route(
            "/api/leaderboard/rank/{player_id}",
            get(handlers::rank::<S, C>),
        )
        .route("/api/leaderboard/health", get(handlers::health::<S, C>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
