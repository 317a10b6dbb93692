//! TallyBroadcaster processor.
//!
//! The TallyBroadcaster is responsible for:
//! - Recomputing the tally from the vote store on a fixed cadence
//! - Broadcasting `scores` and `stats` frames when the per-choice counts
//!   differ from the last broadcast
//! - Publishing every fresh snapshot through a [`SnapshotReader`] so new
//!   subscribers can be synced on connect
//! - Re-sending `stats` when the ballot labels are reloaded
//!
//! A failed aggregation keeps the previous baseline and is retried on the
//! next tick.

use crate::config::{BallotConfig, BroadcasterConfig, ConfigStore};
use crate::entities::TallySnapshot;
use crate::events::LiveBroadcast;
use crate::store::VoteStore;
use crate::utils::retry::{Connector, connect_with_retry, shutdown_requested};
use ballot_sdk::objects::{LiveMessage, Scores};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Result of a single tally cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Unchanged,
    Broadcast,
    QueryFailed,
}

/// Read side of the most recent snapshot the broadcaster computed.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    rx: watch::Receiver<Option<TallySnapshot>>,
}

impl SnapshotReader {
    /// `None` until the first successful aggregation.
    pub fn latest(&self) -> Option<TallySnapshot> {
        self.rx.borrow().clone()
    }
}

/// TallyBroadcaster pushes tally changes to live subscribers.
///
/// The "last broadcast" baseline belongs to the instance, so several
/// broadcasters can run side by side without sharing state.
pub struct TallyBroadcaster<S, L> {
    store_connector: S,
    live: L,
    config: BroadcasterConfig,
    ballot: ConfigStore<BallotConfig>,
    last_broadcast: Option<Scores>,
    snapshot_tx: watch::Sender<Option<TallySnapshot>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<S, L> TallyBroadcaster<S, L>
where
    S: Connector,
    S::Connection: VoteStore,
    L: LiveBroadcast,
{
    pub fn new(
        store_connector: S,
        live: L,
        config: BroadcasterConfig,
        ballot: ConfigStore<BallotConfig>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(None);
        Self {
            store_connector,
            live,
            config,
            ballot,
            last_broadcast: None,
            snapshot_tx,
            shutdown_rx,
        }
    }

    pub fn snapshots(&self) -> SnapshotReader {
        SnapshotReader {
            rx: self.snapshot_tx.subscribe(),
        }
    }

    /// Run the TallyBroadcaster until shutdown is signaled.
    pub async fn run(mut self) {
        let Some(store) = connect_with_retry(
            &self.store_connector,
            self.config.retry,
            &mut self.shutdown_rx,
            |_| {},
        )
        .await
        else {
            info!("TallyBroadcaster stopped before the store was reachable");
            return;
        };

        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            "TallyBroadcaster started"
        );

        let mut ballot_watcher = self.ballot.subscribe();
        self.tick(&store).await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown_requested(&mut self.shutdown_rx) => {
                    info!("TallyBroadcaster received shutdown signal");
                    break;
                }

                Some(ballot) = ballot_watcher.changed() => {
                    info!(
                        option_a = %ballot.option_a,
                        option_b = %ballot.option_b,
                        "Ballot labels changed, re-sending stats"
                    );
                    self.resend_stats();
                }

                _ = tokio::time::sleep(self.config.interval) => {
                    self.tick(&store).await;
                }
            }
        }

        info!("TallyBroadcaster shutdown complete");
    }

    /// Recompute the tally and broadcast it if the counts changed.
    pub async fn tick(&mut self, store: &S::Connection) -> TickOutcome {
        let snapshot = match store.tally(self.config.recent_window()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    error = %e,
                    connection_lost = e.is_connection_error(),
                    "Failed to compute tally, keeping previous baseline"
                );
                return TickOutcome::QueryFailed;
            }
        };

        self.snapshot_tx.send_replace(Some(snapshot.clone()));

        if !snapshot.differs_from(self.last_broadcast.as_ref()) {
            debug!(total = snapshot.total, "Tally unchanged");
            return TickOutcome::Unchanged;
        }

        info!(
            total = snapshot.total,
            recent = snapshot.recent,
            "Tally changed, broadcasting"
        );
        for message in snapshot.live_messages(self.ballot.current().labels()) {
            self.live.broadcast(message);
        }
        self.last_broadcast = Some(snapshot.counts);
        TickOutcome::Broadcast
    }

    fn resend_stats(&self) {
        let Some(snapshot) = self.snapshot_tx.borrow().clone() else {
            return;
        };
        let stats = snapshot.to_stats(self.ballot.current().labels());
        self.live.broadcast(LiveMessage::Stats(stats));
    }
}
