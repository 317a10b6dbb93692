//! Runtime configuration types for the vote pipeline.
//!
//! These are the validated values the processors run with. Loading and
//! parsing the TOML file is the server crate's job.

mod config_store;

pub use config_store::{ConfigStore, ConfigWatcher};

use crate::queue::DEFAULT_QUEUE_NAME;
use crate::utils::retry::RetryPolicy;
use ballot_sdk::objects::OptionLabels;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Display labels for the ballot. Reloadable at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BallotConfig {
    pub option_a: String,
    pub option_b: String,
}

impl BallotConfig {
    pub fn labels(&self) -> OptionLabels {
        OptionLabels {
            a: self.option_a.clone(),
            b: self.option_b.clone(),
        }
    }
}

impl Default for BallotConfig {
    fn default() -> Self {
        Self {
            option_a: "Cats".to_owned(),
            option_b: "Dogs".to_owned(),
        }
    }
}

/// What the consumer does with a record whose store write failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteFailurePolicy {
    /// Log and discard. A store outage can lose the vote.
    #[default]
    Drop,
    /// Push the record back to the head of the queue so it is retried
    /// once the store is reachable again.
    Requeue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Sleep between polls of an empty queue.
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
    pub on_write_failure: WriteFailurePolicy,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            retry: RetryPolicy::default(),
            on_write_failure: WriteFailurePolicy::Drop,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcasterConfig {
    /// Time between tally recomputations.
    pub interval: Duration,
    /// How far back the `recent` count in stats frames looks.
    pub recent_window: Duration,
    pub retry: RetryPolicy,
}

impl BroadcasterConfig {
    pub fn recent_window(&self) -> time::Duration {
        time::Duration::try_from(self.recent_window).unwrap_or(time::Duration::MAX)
    }
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            recent_window: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Name of the Redis list.
    pub name: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_QUEUE_NAME.to_owned(),
        }
    }
}
