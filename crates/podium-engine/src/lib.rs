//! Podium ranking engine.
//!
//! The engine owns the four moving parts of the leaderboard: the
//! [`coordinator`] (serialized atomic submissions), the [`rank`] module
//! (the single ordering every read and write agrees on), the [`cache`]
//! (read-through with enumerated-key invalidation), and the
//! [`broadcast`] fan-out (serialize-once rank-change stream).
//!
//! Storage is abstracted behind [`store::LeaderboardStore`];
//! [`memory::MemoryStore`] is the in-process implementation used by
//! tests and single-node deployments, and `podium-db` provides the
//! `PostgreSQL` one.

pub mod broadcast;
pub mod cache;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod rank;
pub mod store;

pub use broadcast::{BroadcastManager, ConnectionState};
pub use cache::{CacheBackend, CacheError, CacheKey, CacheLayer, CachePrefix, CacheTtls, MemoryCache};
pub use coordinator::{Coordinator, CoordinatorConfig, MAX_PAGE_LIMIT};
pub use error::EngineError;
pub use memory::MemoryStore;
pub use store::{LeaderboardStore, StoreError, SubmitCommit, SubmitOp, TopSlice};
