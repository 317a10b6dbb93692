pub mod api;
pub mod ballot;
pub mod live;

pub use api::{
    CastVoteRequest, CastVoteResponse, HealthResponse, LinkStatus, StatsResponse,
    StoredVoteResponse,
};
pub use ballot::{BallotChoice, UnknownChoice, VoteRecord};
pub use live::{LiveMessage, OptionLabels, Scores, StatsPayload};
