//! Frames pushed over the live tally channel.
//!
//! The `GET /ws` endpoint upgrades to a WebSocket and pushes
//! [`LiveMessage`] JSON frames.
//!
//! # Protocol
//!
//! 1. Right after the upgrade the server sends the current `scores` and
//!    `stats` frames to the new subscriber only.
//! 2. Afterwards both frames are broadcast to every subscriber whenever the
//!    per-choice counts change.
//! 3. A `stats` frame is also broadcast when the option labels are
//!    reloaded.
//!
//! ```json
//! {"event":"scores","data":{"a":3,"b":5}}
//! {"event":"stats","data":{"current":{"a":3,"b":5},"total":8,"recent":2,"timestamp":1700000000,"options":{"a":"Cats","b":"Dogs"}}}
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ballot::BallotChoice;

/// Vote count per ballot choice.
///
/// Always carries an entry for every choice in [`BallotChoice::ALL`], so a
/// choice nobody picked serializes as `0` instead of disappearing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scores(BTreeMap<BallotChoice, i64>);

impl Scores {
    pub fn new() -> Self {
        Self(BallotChoice::ALL.iter().map(|c| (*c, 0)).collect())
    }

    pub fn get(&self, choice: BallotChoice) -> i64 {
        self.0.get(&choice).copied().unwrap_or(0)
    }

    pub fn set(&mut self, choice: BallotChoice, count: i64) {
        self.0.insert(choice, count);
    }

    pub fn total(&self) -> i64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BallotChoice, i64)> + '_ {
        self.0.iter().map(|(c, n)| (*c, *n))
    }
}

impl Default for Scores {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<(BallotChoice, i64)> for Scores {
    fn from_iter<I: IntoIterator<Item = (BallotChoice, i64)>>(iter: I) -> Self {
        let mut scores = Scores::new();
        for (choice, count) in iter {
            scores.set(choice, count);
        }
        scores
    }
}

/// Display labels for each choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionLabels {
    pub a: String,
    pub b: String,
}

/// Richer tally payload for dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsPayload {
    /// Count per choice.
    pub current: Scores,
    /// Number of distinct voters.
    pub total: i64,
    /// Votes cast within the server's recent window.
    pub recent: i64,
    /// Unix timestamp (seconds) of the aggregation.
    pub timestamp: i64,
    pub options: OptionLabels,
}

/// Server-to-client live channel frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum LiveMessage {
    Scores(Scores),
    Stats(StatsPayload),
}
