use axum::{Json, extract::State};
use ballot_core::store::VoteStore;
use ballot_sdk::objects::StatsResponse;

use super::ApiError;
use crate::state::AppState;

/// `GET /api/stats` — tally computed straight from the store.
///
/// Unlike the live channel this does not wait for the broadcaster, so it
/// reflects every vote the consumer has applied so far.
pub(super) async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, ApiError> {
    let snapshot = state
        .store
        .tally(state.recent_window)
        .await
        .map_err(ApiError::Store)?;

    Ok(Json(StatsResponse {
        votes: snapshot.counts,
        total: snapshot.total,
        options: state.ballot.current().labels(),
        timestamp: snapshot.computed_at.unix_timestamp(),
    }))
}
