//! Configuration module for ballot-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::FileConfig;
use ballot_core::config::{BallotConfig, BroadcasterConfig, ConsumerConfig, QueueConfig};
use ballot_core::utils::retry::RetryPolicy;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Used when `REDIS_URL` is not set.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1/";

/// Longest accepted `broadcaster.recent_window_secs` (one year).
pub const MAX_RECENT_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub ballot: BallotConfig,
    pub queue: QueueConfig,
    pub consumer: ConsumerConfig,
    pub broadcaster: BroadcasterConfig,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.load_str(&config_content)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn load_str(&self, content: &str) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;
        Ok(build_loaded_config(file_config))
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let intervals = [
        ("consumer.poll_interval_ms", config.consumer.poll_interval_ms),
        ("consumer.retry_interval_ms", config.consumer.retry_interval_ms),
        ("broadcaster.interval_ms", config.broadcaster.interval_ms),
    ];
    for (name, value) in intervals {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{name} must be greater than zero"
            )));
        }
    }

    if config.broadcaster.recent_window_secs > MAX_RECENT_WINDOW_SECS {
        return Err(ConfigError::ValidationError(format!(
            "broadcaster.recent_window_secs must be at most {MAX_RECENT_WINDOW_SECS}"
        )));
    }

    if config.queue.name.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "queue.name must not be empty".to_owned(),
        ));
    }

    if config.ballot.option_a.trim().is_empty() || config.ballot.option_b.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "ballot option labels must not be empty".to_owned(),
        ));
    }

    Ok(())
}

fn build_loaded_config(file_config: FileConfig) -> LoadedConfig {
    let FileConfig {
        server,
        ballot,
        queue,
        consumer,
        broadcaster,
    } = file_config;

    LoadedConfig {
        listen: server.listen,
        ballot: BallotConfig {
            option_a: ballot.option_a,
            option_b: ballot.option_b,
        },
        queue: QueueConfig { name: queue.name },
        consumer: ConsumerConfig {
            poll_interval: Duration::from_millis(consumer.poll_interval_ms),
            retry: RetryPolicy::fixed(Duration::from_millis(consumer.retry_interval_ms)),
            on_write_failure: consumer.on_write_failure,
        },
        broadcaster: BroadcasterConfig {
            interval: Duration::from_millis(broadcaster.interval_ms),
            recent_window: Duration::from_secs(broadcaster.recent_window_secs),
            retry: RetryPolicy::fixed(Duration::from_millis(consumer.retry_interval_ms)),
        },
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

/// Get the Redis URL from the environment, falling back to localhost.
pub fn get_redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_owned())
}
