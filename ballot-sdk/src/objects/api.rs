//! HTTP API request and response bodies.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use super::ballot::BallotChoice;
use super::live::{OptionLabels, Scores};

/// `POST /api/vote` body.
///
/// `voter_id` is optional; the server assigns a random identity when it is
/// missing and echoes it back so the caller can reuse it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastVoteRequest {
    pub vote: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter_id: Option<CompactString>,
}

/// Returned once the vote has been queued (not yet applied).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastVoteResponse {
    pub vote: BallotChoice,
    pub voter_id: CompactString,
}

/// `GET /api/vote/{voter_id}` body: what the store currently holds for a
/// voter. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredVoteResponse {
    pub voter_id: CompactString,
    pub vote: BallotChoice,
    pub cast_at: i64,
    pub recorded_at: i64,
}

/// `GET /api/stats` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub votes: Scores,
    pub total: i64,
    pub options: OptionLabels,
    pub timestamp: i64,
}

/// Reachability of a backing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Connected,
    Disconnected,
}

/// `GET /api/health` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: LinkStatus,
    pub queue: LinkStatus,
    /// Current phase of the queue consumer loop.
    pub consumer: String,
}
