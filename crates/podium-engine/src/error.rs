//! Error taxonomy for the ranking engine.
//!
//! The taxonomy mirrors how failures propagate: [`EngineError::InvalidInput`]
//! and [`EngineError::NotFound`] surface before any state change,
//! [`EngineError::Conflict`] is retryable by the caller (the engine never
//! auto-retries, so contention storms stay visible), and
//! [`EngineError::Storage`] means the transaction rolled back with no
//! partial state. Cache unavailability and subscriber overflow are handled
//! entirely inside their owning components and never appear here.

use podium_types::PlayerId;

use crate::store::StoreError;

/// Errors surfaced by the ranking engine's external operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The request was malformed or out of range. Rejected before any
    /// state change or lock acquisition.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The player is unknown or inactive.
    #[error("player not found: {0}")]
    NotFound(PlayerId),

    /// The ordering lock could not be acquired within the bounded wait.
    /// Retryable by the caller with backoff.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A durable write failed. The transaction was fully rolled back;
    /// no partial state persists.
    #[error("storage error: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PlayerNotFound(player) => Self::NotFound(player),
            other => Self::Storage(other),
        }
    }
}
