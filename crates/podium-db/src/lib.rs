//! Data layer for the Podium leaderboard (`PostgreSQL` + Redis).
//!
//! `PostgreSQL` is the durable store: player records, the append-only
//! score event log, and the denormalized leaderboard aggregates. Redis
//! is the optional read cache the engine's cache layer sits on; losing
//! it degrades read latency, never correctness.
//!
//! # Architecture
//!
//! ```text
//! podium-engine Coordinator
//!     |
//!     +-- LeaderboardStore --> PostgreSQL (PgLeaderboardStore)
//!     |       |-- players          (identity, soft-delete flag)
//!     |       |-- score_events     (append-only audit log)
//!     |       +-- leaderboard      (per-player aggregates + rank)
//!     |
//!     +-- CacheBackend ------> Redis (RedisCache)
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`leaderboard_store`] -- The engine's storage contract over `PostgreSQL`
//! - [`score_event_store`] -- Append-only score event persistence
//! - [`redis`] -- Redis cache backend
//! - [`error`] -- Shared error types

pub mod error;
pub mod leaderboard_store;
pub mod postgres;
pub mod redis;
pub mod score_event_store;

// Re-export primary types for convenience.
pub use error::DbError;
pub use leaderboard_store::PgLeaderboardStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use redis::RedisCache;
pub use score_event_store::ScoreEventStore;
