//! Leaderboard API server (Axum HTTP + `WebSocket`) for Podium.
//!
//! Thin HTTP shell over the `podium-engine` coordinator: REST routes for
//! submission and reads, one `WebSocket` route for the snapshot +
//! rank-change stream. The crate is generic over the engine's storage
//! and cache backends so tests run the full router against the
//! in-memory stack.
//!
//! # Modules
//!
//! - [`router`] -- Route assembly (REST + `WebSocket`, CORS, tracing)
//! - [`handlers`] -- REST endpoint handlers
//! - [`ws`] -- `WebSocket` stream handler
//! - [`state`] -- Shared application state
//! - [`server`] -- TCP bind and serve lifecycle
//! - [`error`] -- HTTP error mapping

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
