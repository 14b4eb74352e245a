//! Shared type definitions for the Podium leaderboard engine.
//!
//! This crate holds the types every other crate agrees on: strongly-typed
//! IDs, the game mode enum, the persistent domain shapes (player, score
//! event, leaderboard aggregate), the request/response shapes of the
//! external interface, and the `WebSocket` wire messages. It carries no
//! behavior beyond validation and conversions so it can sit at the bottom
//! of the dependency graph.
//!
//! Types that cross the HTTP or `WebSocket` boundary derive [`ts_rs::TS`]
//! and export TypeScript bindings for the dashboard.

pub mod enums;
pub mod ids;
pub mod messages;
pub mod structs;

// Re-export primary types for convenience.
pub use enums::GameMode;
pub use ids::{PlayerId, ScoreEventId};
pub use messages::StreamMessage;
pub use structs::{
    ChangeEvent, HealthStatus, LeaderboardEntry, Player, RankView, ScoreEvent, SubmitReceipt,
    SubmitRequest, TopPage,
};
