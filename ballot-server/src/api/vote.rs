use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use ballot_core::entities::votes::GetStoredVote;
use ballot_core::framework::DatabaseProcessor;
use ballot_core::queue::VoteQueue;
use ballot_sdk::objects::{
    BallotChoice, CastVoteRequest, CastVoteResponse, StoredVoteResponse, VoteRecord,
};
use compact_str::{CompactString, format_compact};
use kanau::processor::Processor;

use super::ApiError;
use crate::state::AppState;

const MAX_VOTER_ID_LEN: usize = 128;

/// `POST /api/vote` — queue a vote.
///
/// The vote is only enqueued here; the queue consumer applies it to the
/// store. Responds `202 Accepted` with the voter identity used.
pub(super) async fn cast_vote(
    State(state): State<AppState>,
    Json(request): Json<CastVoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record = build_record(request)?;
    let payload = serde_json::to_vec(&record).map_err(ApiError::Encode)?;

    let mut queue = state.queue.clone();
    queue.push(&payload).await.map_err(ApiError::Queue)?;

    tracing::debug!(vote = %record.vote, voter_id = %record.voter_id, "Vote queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(CastVoteResponse {
            vote: record.vote,
            voter_id: record.voter_id,
        }),
    ))
}

/// `GET /api/vote/{voter_id}` — the vote currently stored for a voter.
pub(super) async fn get_vote(
    State(state): State<AppState>,
    Path(voter_id): Path<CompactString>,
) -> Result<Json<StoredVoteResponse>, ApiError> {
    let processor = DatabaseProcessor {
        pool: state.store.pool().clone(),
    };

    let stored = processor
        .process(GetStoredVote { voter_id })
        .await
        .map_err(|e| ApiError::Store(e.into()))?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(StoredVoteResponse {
        voter_id: stored.voter_id.into(),
        vote: stored.vote,
        cast_at: stored.cast_at.assume_utc().unix_timestamp(),
        recorded_at: stored.recorded_at.assume_utc().unix_timestamp(),
    }))
}

/// Validate a request and turn it into the record pushed onto the queue.
///
/// A missing or blank `voter_id` gets a fresh random one.
fn build_record(request: CastVoteRequest) -> Result<VoteRecord, ApiError> {
    let vote: BallotChoice = request
        .vote
        .parse()
        .map_err(|_| ApiError::InvalidChoice(request.vote.clone()))?;

    let voter_id = match request.voter_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => new_voter_id(),
    };
    if voter_id.len() > MAX_VOTER_ID_LEN {
        return Err(ApiError::InvalidVoterId);
    }

    Ok(VoteRecord::new(vote, voter_id))
}

fn new_voter_id() -> CompactString {
    format_compact!("{:016x}", rand::random::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(vote: &str, voter_id: Option<&str>) -> CastVoteRequest {
        CastVoteRequest {
            vote: vote.to_owned(),
            voter_id: voter_id.map(Into::into),
        }
    }

    #[test]
    fn test_keeps_supplied_voter_id() {
        let record = build_record(request("b", Some("voter-42"))).unwrap();
        assert_eq!(record.vote, BallotChoice::B);
        assert_eq!(record.voter_id, "voter-42");
    }

    #[test]
    fn test_generates_voter_id_when_missing() {
        let first = build_record(request("a", None)).unwrap();
        let second = build_record(request("a", Some("   "))).unwrap();
        assert_eq!(first.voter_id.len(), 16);
        assert_eq!(second.voter_id.len(), 16);
        assert_ne!(first.voter_id, second.voter_id);
    }

    #[test]
    fn test_rejects_unknown_choice() {
        let err = build_record(request("c", Some("voter-1"))).unwrap_err();
        assert!(matches!(err, ApiError::InvalidChoice(v) if v == "c"));
    }

    #[test]
    fn test_rejects_oversized_voter_id() {
        let long = "x".repeat(MAX_VOTER_ID_LEN + 1);
        let err = build_record(request("a", Some(&long))).unwrap_err();
        assert!(matches!(err, ApiError::InvalidVoterId));
    }

    #[test]
    fn test_record_matches_queue_wire_format() {
        let record = build_record(request("a", Some("voter-7"))).unwrap();
        let payload = serde_json::to_value(&record).unwrap();
        assert_eq!(payload, serde_json::json!({"vote": "a", "voter_id": "voter-7"}));
    }
}
