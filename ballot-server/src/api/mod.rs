//! HTTP and WebSocket handlers.
//!
//! # Endpoints
//!
//! - `POST /api/vote`             – queue a vote
//! - `GET  /api/vote/{voter_id}`  – the vote currently stored for a voter
//! - `GET  /api/stats`            – tally straight from the store
//! - `GET  /api/health`           – store, queue and consumer status
//! - `GET  /ws`                   – live tally stream

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use ballot_core::queue::QueueError;
use ballot_core::store::StoreError;

use crate::state::AppState;

mod health;
mod stats;
mod vote;
mod ws;

/// Build the `/api` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/vote", post(vote::cast_vote))
        .route("/vote/{voter_id}", get(vote::get_vote))
        .route("/stats", get(stats::get_stats))
        .route("/health", get(health::health))
}

/// Build the router for the live channel.
pub fn live_router() -> Router<AppState> {
    Router::new().route("/ws", get(ws::live_ws))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur in API handlers.
#[derive(Debug)]
enum ApiError {
    /// A store query failed.
    Store(StoreError),
    /// Pushing to the vote queue failed.
    Queue(QueueError),
    /// The vote record could not be serialized.
    Encode(serde_json::Error),
    /// `vote` is not one of the ballot choices.
    InvalidChoice(String),
    /// `voter_id` is too long.
    InvalidVoterId,
    /// No vote has been applied for this voter.
    NotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::Store(e) => {
                tracing::error!(error = %e, "Store error in API handler");
                let status = if e.is_connection_error() {
                    StatusCode::SERVICE_UNAVAILABLE
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, "store unavailable").into_response()
            }
            ApiError::Queue(e) => {
                tracing::error!(error = %e, "Queue error in API handler");
                (StatusCode::SERVICE_UNAVAILABLE, "queue unavailable").into_response()
            }
            ApiError::Encode(e) => {
                tracing::error!(error = %e, "Failed to encode vote record");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
            ApiError::InvalidChoice(vote) => (
                StatusCode::BAD_REQUEST,
                format!("unknown ballot choice: {vote:?}"),
            )
                .into_response(),
            ApiError::InvalidVoterId => {
                (StatusCode::BAD_REQUEST, "voter_id too long").into_response()
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, "vote not found").into_response(),
        }
    }
}
