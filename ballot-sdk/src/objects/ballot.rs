//! Ballot choices and the queued vote record.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the fixed options a voter can pick.
///
/// Serialized as the single lowercase letter stored in the `votes.vote`
/// column and carried in queue records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BallotChoice {
    A,
    B,
}

impl BallotChoice {
    /// Every choice, in display order.
    pub const ALL: [BallotChoice; 2] = [BallotChoice::A, BallotChoice::B];

    pub fn as_str(self) -> &'static str {
        match self {
            BallotChoice::A => "a",
            BallotChoice::B => "b",
        }
    }
}

impl fmt::Display for BallotChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown ballot choice: {0:?}")]
pub struct UnknownChoice(pub String);

impl FromStr for BallotChoice {
    type Err = UnknownChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" => Ok(BallotChoice::A),
            "b" => Ok(BallotChoice::B),
            other => Err(UnknownChoice(other.to_owned())),
        }
    }
}

/// A vote as it travels through the queue.
///
/// Wire form: `{"vote": "a", "voter_id": "3f2a..."}`. Extra fields written by
/// older producers (such as a submission timestamp) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub vote: BallotChoice,
    pub voter_id: CompactString,
}

impl VoteRecord {
    pub fn new(vote: BallotChoice, voter_id: impl Into<CompactString>) -> Self {
        Self {
            vote,
            voter_id: voter_id.into(),
        }
    }
}
