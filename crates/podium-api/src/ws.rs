//! `WebSocket` handler for the live leaderboard stream.
//!
//! Clients connect to `GET /ws/leaderboard`. The handler subscribes to
//! the rank-change stream *before* sending the snapshot, so no update
//! committed after the snapshot can be missed; a client may see an
//! update it already holds, which is harmless.
//!
//! A client that falls behind the bounded channel is disconnected rather
//! than silently resumed: after a gap the client's board is wrong, and
//! reconnecting replays a fresh snapshot.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tracing::{debug, warn};

use podium_engine::{CacheBackend, ConnectionState, LeaderboardStore};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming the leaderboard.
///
/// # Route
///
/// `GET /ws/leaderboard`
pub async fn ws_leaderboard<S, C>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<S, C>>,
) -> impl IntoResponse
where
    S: LeaderboardStore,
    C: CacheBackend,
{
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Drive one connection through its lifecycle: subscribe, snapshot,
/// stream, close.
async fn handle_ws<S, C>(mut socket: WebSocket, state: AppState<S, C>)
where
    S: LeaderboardStore,
    C: CacheBackend,
{
    debug!("WebSocket client connected");
    let mut conn = ConnectionState::Connecting;

    // Subscribe first: updates committed while the snapshot is in
    // flight queue here instead of being lost.
    let mut rx = state.subscribe();

    let snapshot = match state.coordinator.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("Snapshot unavailable, closing WebSocket: {e}");
            return;
        }
    };
    let json = match serde_json::to_string(&snapshot) {
        Ok(j) => j,
        Err(e) => {
            warn!("Failed to serialize snapshot: {e}");
            return;
        }
    };
    if socket.send(Message::Text(json.into())).await.is_err() {
        debug!("WebSocket client disconnected before snapshot");
        return;
    }
    conn = conn.advance(); // SnapshotSent
    conn = conn.advance(); // Streaming

    while conn.is_streaming() {
        tokio::select! {
            // Receive a pre-serialized rank change from the fan-out.
            result = rx.recv() => {
                match result {
                    Ok(payload) => {
                        let msg: Message = Message::Text(payload.as_ref().into());
                        if socket.send(msg).await.is_err() {
                            debug!("WebSocket client disconnected (send failed)");
                            conn = conn.advance();
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        // The client's board is stale beyond repair;
                        // force a reconnect for a fresh snapshot.
                        debug!(skipped = n, "WebSocket client lagged, disconnecting");
                        conn = conn.advance();
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed, shutting down WebSocket");
                        conn = conn.advance();
                    }
                }
            }
            // Check if the client sent a close frame or disconnected.
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client disconnected");
                        conn = conn.advance();
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let pong = Message::Pong(data);
                        if socket.send(pong).await.is_err() {
                            debug!("WebSocket client disconnected (pong failed)");
                            conn = conn.advance();
                        }
                    }
                    Some(Ok(Message::Text(text))) if text.as_str() == "ping" => {
                        // Application-level keepalive for clients without
                        // frame-level ping support.
                        if socket.send(Message::Text("pong".into())).await.is_err() {
                            debug!("WebSocket client disconnected (pong failed)");
                            conn = conn.advance();
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {e}");
                        conn = conn.advance();
                    }
                    _ => {
                        // Ignore other client messages.
                    }
                }
            }
        }
    }

    socket.send(Message::Close(None)).await.ok();
    debug!("WebSocket connection closed");
}
