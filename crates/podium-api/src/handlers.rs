//! REST endpoint handlers for the leaderboard API.
//!
//! All handlers delegate to the engine coordinator held in [`AppState`];
//! the API layer only translates between HTTP and engine types.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `POST` | `/api/leaderboard/submit` | Submit a score |
//! | `GET` | `/api/leaderboard/top` | Paginated top-N view |
//! | `GET` | `/api/leaderboard/rank/:player_id` | Single-player rank detail |
//! | `GET` | `/api/leaderboard/health` | Engine + cache health |

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse};
use uuid::Uuid;

use podium_engine::{CacheBackend, LeaderboardStore};
use podium_types::{PlayerId, SubmitRequest};

use crate::error::ApiError;
use crate::state::AppState;

/// Default page size for `GET /api/leaderboard/top`.
const DEFAULT_TOP_LIMIT: u32 = 100;

/// Query parameters for the `GET /api/leaderboard/top` endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct TopQuery {
    /// Page size (default 100, max 1000).
    pub limit: Option<u32>,
    /// Entries to skip before the page (default 0).
    pub offset: Option<u32>,
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing server status and API links.
pub async fn index<S, C>(State(state): State<AppState<S, C>>) -> impl IntoResponse
where
    S: LeaderboardStore,
    C: CacheBackend,
{
    let subscribers = state.coordinator.subscriber_count();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Podium Leaderboard</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        a:hover {{ text-decoration: underline; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        .status {{ color: #3fb950; font-weight: bold; }}
        hr {{ border: none; border-top: 1px solid #30363d; margin: 1.5rem 0; }}
    </style>
</head>
<body>
    <h1>Podium</h1>
    <p class="subtitle">Real-time ranked leaderboard</p>

    <p>Status: <span class="status">RUNNING</span> -- {subscribers} live stream subscriber(s)</p>

    <hr>

    <h2>API</h2>
    <ul>
        <li>POST <a href="/api/leaderboard/submit">/api/leaderboard/submit</a> -- Submit a score</li>
        <li>GET <a href="/api/leaderboard/top">/api/leaderboard/top</a> -- Top players (?limit=N&amp;offset=M)</li>
        <li>GET <a href="/api/leaderboard/rank/:player_id">/api/leaderboard/rank/:player_id</a> -- Player rank detail</li>
        <li>GET <a href="/api/leaderboard/health">/api/leaderboard/health</a> -- Health check</li>
    </ul>

    <h2>WebSocket</h2>
    <ul>
        <li><code>ws://host:port/ws/leaderboard</code> -- Snapshot + live rank updates</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// POST /api/leaderboard/submit -- submit a score
// ---------------------------------------------------------------------------

/// Submit a score for a player.
///
/// Returns the receipt with the freshly computed rank. Fails with 400
/// for malformed input, 404 for an unknown player, and 409 when the
/// submission could not be serialized in time (retry with backoff).
pub async fn submit<S, C>(
    State(state): State<AppState<S, C>>,
    Json(request): Json<SubmitRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: LeaderboardStore,
    C: CacheBackend,
{
    let receipt = state.coordinator.submit(request).await?;
    Ok(Json(receipt))
}

// ---------------------------------------------------------------------------
// GET /api/leaderboard/top -- paginated top-N view
// ---------------------------------------------------------------------------

/// Return a page of the leaderboard, best first.
///
/// # Query Parameters
///
/// - `limit`: page size, 1 to 1000 (default 100)
/// - `offset`: entries to skip (default 0)
pub async fn top<S, C>(
    State(state): State<AppState<S, C>>,
    Query(params): Query<TopQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    S: LeaderboardStore,
    C: CacheBackend,
{
    let limit = params.limit.unwrap_or(DEFAULT_TOP_LIMIT);
    let offset = params.offset.unwrap_or(0);
    let page = state.coordinator.top(limit, offset).await?;
    Ok(Json(page))
}

// ---------------------------------------------------------------------------
// GET /api/leaderboard/rank/:player_id -- single-player rank detail
// ---------------------------------------------------------------------------

/// Return rank, total score, win rate, and percentile for one player.
pub async fn rank<S, C>(
    State(state): State<AppState<S, C>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: LeaderboardStore,
    C: CacheBackend,
{
    let id = parse_uuid(&id_str)?;
    let view = state.coordinator.rank_of(PlayerId::from(id)).await?;
    Ok(Json(view))
}

// ---------------------------------------------------------------------------
// GET /api/leaderboard/health -- engine + cache health
// ---------------------------------------------------------------------------

/// Report engine liveness and cache reachability.
///
/// Always 200 while the server is up: an unreachable cache degrades
/// reads, it does not fail them.
pub async fn health<S, C>(State(state): State<AppState<S, C>>) -> impl IntoResponse
where
    S: LeaderboardStore,
    C: CacheBackend,
{
    Json(state.coordinator.health().await)
}

/// Parse a UUID from a path segment.
fn parse_uuid(s: &str) -> Result<Uuid, ApiError> {
    s.parse::<Uuid>()
        .map_err(|e| ApiError::InvalidUuid(format!("'{s}' is not a valid UUID: {e}")))
}
