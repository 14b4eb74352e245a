//! Error types for the leaderboard API layer.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can be
//! converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Engine
//! errors map onto the obvious status codes; conflict is 409 so callers
//! know a retry with backoff is appropriate.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use podium_engine::EngineError;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The ranking engine rejected or failed the operation.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A UUID could not be parsed from the request path.
    #[error("invalid UUID: {0}")]
    InvalidUuid(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Engine(EngineError::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            Self::Engine(EngineError::NotFound(player)) => {
                (StatusCode::NOT_FOUND, format!("player not found: {player}"))
            }
            Self::Engine(EngineError::Conflict(msg)) => (StatusCode::CONFLICT, msg.clone()),
            Self::Engine(EngineError::Storage(err)) => {
                tracing::error!(error = %err, "storage failure surfaced to API");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    String::from("internal storage error"),
                )
            }
            Self::InvalidUuid(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
