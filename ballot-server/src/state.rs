//! Application state shared across all request handlers.

use ballot_core::config::{BallotConfig, ConfigStore};
use ballot_core::events::LiveRegistry;
use ballot_core::processors::{ConsumerPhase, SnapshotReader};
use ballot_core::queue::RedisVoteQueue;
use ballot_core::store::PgVoteStore;
use tokio::sync::watch;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around.
#[derive(Clone)]
pub struct AppState {
    /// Request-path store handle. Separate pool from the background loops.
    pub store: PgVoteStore,
    /// Request-path queue handle used by the intake endpoint.
    pub queue: RedisVoteQueue,
    /// Live viewer registry fed by the tally broadcaster.
    pub live: LiveRegistry,
    /// Latest tally the broadcaster computed, for syncing new viewers.
    pub snapshots: SnapshotReader,
    /// Ballot labels (can be reloaded via SIGHUP).
    pub ballot: ConfigStore<BallotConfig>,
    pub consumer_phase: watch::Receiver<ConsumerPhase>,
    /// Window used for the `recent` count when the store is queried directly.
    pub recent_window: time::Duration,
}
