//! Connect-with-retry for external dependencies.
//!
//! Every dependency (the vote queue, the vote store) is reached through a
//! [`Connector`]. [`connect_with_retry`] drives one connector through the
//! `Disconnected -> Connecting -> Connected` states, sleeping a fixed
//! [`RetryPolicy::interval`] between failed attempts. There is no attempt
//! limit: the only way out other than success is the shutdown flag.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Something that can open a connection to an external dependency.
pub trait Connector: Send + Sync {
    type Connection: Send;
    type Error: Display + Send;

    /// Short name used in logs ("queue", "store").
    fn name(&self) -> &'static str;

    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// Link state of a single dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// `attempt` counts from 1.
    Connecting { attempt: u32 },
    Connected,
}

/// Fixed-interval, unbounded retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn fixed(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}

/// Whether the shutdown flag is raised. A dropped sender counts as raised.
pub fn shutdown_flagged(shutdown_rx: &watch::Receiver<bool>) -> bool {
    *shutdown_rx.borrow() || shutdown_rx.has_changed().is_err()
}

/// Resolves once the shutdown flag is raised or its sender is dropped.
pub async fn shutdown_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}

/// Open a connection through `connector`, retrying forever.
///
/// Each failed attempt is logged at `warn` and followed by a sleep of
/// `policy.interval`. `on_state` observes every state transition.
///
/// Returns `None` only if shutdown was requested before a connection
/// could be established.
pub async fn connect_with_retry<C: Connector>(
    connector: &C,
    policy: RetryPolicy,
    shutdown_rx: &mut watch::Receiver<bool>,
    mut on_state: impl FnMut(ConnectionState) + Send,
) -> Option<C::Connection> {
    let dependency = connector.name();
    let mut attempt: u32 = 0;

    loop {
        if shutdown_flagged(shutdown_rx) {
            debug!(dependency, "Shutdown requested, abandoning connect");
            on_state(ConnectionState::Disconnected);
            return None;
        }

        attempt = attempt.saturating_add(1);
        on_state(ConnectionState::Connecting { attempt });

        match connector.connect().await {
            Ok(connection) => {
                info!(dependency, attempt, "Connected");
                on_state(ConnectionState::Connected);
                return Some(connection);
            }
            Err(e) => {
                warn!(
                    dependency,
                    attempt,
                    error = %e,
                    retry_in_ms = policy.interval.as_millis() as u64,
                    "Connection attempt failed"
                );
                on_state(ConnectionState::Disconnected);
            }
        }

        tokio::select! {
            biased;

            _ = shutdown_requested(shutdown_rx) => {
                debug!(dependency, "Shutdown requested while waiting to reconnect");
                return None;
            }

            _ = tokio::time::sleep(policy.interval) => {}
        }
    }
}
