//! TOML file configuration structures.
//!
//! These structs directly map to the `ballot-config.toml` file format.
//! Every section is optional and falls back to its defaults.

use ballot_core::config::WriteFailurePolicy;
use ballot_core::queue::DEFAULT_QUEUE_NAME;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub ballot: BallotConfig,
    pub queue: QueueConfig,
    pub consumer: ConsumerConfig,
    pub broadcaster: BroadcasterConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Ballot labels shown to voters and viewers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BallotConfig {
    pub option_a: String,
    pub option_b: String,
}

impl Default for BallotConfig {
    fn default() -> Self {
        Self {
            option_a: "Cats".to_owned(),
            option_b: "Dogs".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Name of the Redis list holding pending votes.
    pub name: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_QUEUE_NAME.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    pub poll_interval_ms: u64,
    pub retry_interval_ms: u64,
    pub on_write_failure: WriteFailurePolicy,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            retry_interval_ms: 1000,
            on_write_failure: WriteFailurePolicy::Drop,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcasterConfig {
    pub interval_ms: u64,
    pub recent_window_secs: u64,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            recent_window_secs: 60,
        }
    }
}
