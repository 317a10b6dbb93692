use axum::{Json, extract::State, response::IntoResponse};
use ballot_core::queue::VoteQueue;
use ballot_core::store::VoteStore;
use ballot_sdk::objects::{HealthResponse, LinkStatus};

use crate::state::AppState;

/// `GET /api/health` — always `200`. `status` is `"degraded"` when the
/// store or the queue does not answer a ping.
pub(super) async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.store.ping().await {
        Ok(()) => LinkStatus::Connected,
        Err(e) => {
            tracing::warn!(error = %e, "Health check: store unreachable");
            LinkStatus::Disconnected
        }
    };

    let mut queue = state.queue.clone();
    let queue = match queue.ping().await {
        Ok(()) => LinkStatus::Connected,
        Err(e) => {
            tracing::warn!(error = %e, "Health check: queue unreachable");
            LinkStatus::Disconnected
        }
    };

    let consumer = state.consumer_phase.borrow().as_str().to_owned();
    let healthy = database == LinkStatus::Connected && queue == LinkStatus::Connected;

    Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        database,
        queue,
        consumer,
    })
}
