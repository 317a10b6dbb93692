//! QueueConsumer processor.
//!
//! The QueueConsumer is responsible for:
//! - Keeping a connection to the vote queue and to the vote store, each
//!   re-established independently (and indefinitely) whenever it drops
//! - Popping the oldest queued record every cycle, sleeping a fixed poll
//!   interval whenever the queue is empty
//! - Discarding records that do not decode into a valid [`VoteRecord`]
//! - Applying valid records with a single atomic upsert
//! - Dropping or requeueing records whose store write failed, according to
//!   [`WriteFailurePolicy`]
//!
//! Shutdown is only observed between cycles, so a write that has started
//! always runs to completion.

use crate::config::{ConsumerConfig, WriteFailurePolicy};
use crate::entities::{UpsertOutcome, UpsertVote};
use crate::queue::VoteQueue;
use crate::store::VoteStore;
use crate::utils::now_primitive;
use crate::utils::retry::{
    ConnectionState, Connector, RetryPolicy, connect_with_retry, shutdown_flagged,
    shutdown_requested,
};
use ballot_sdk::objects::VoteRecord;
use std::fmt;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Why a queued payload was rejected.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("not a valid vote record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("voter_id is empty")]
    EmptyVoterId,
}

/// Decode a raw queue payload.
pub fn decode_record(payload: &[u8]) -> Result<VoteRecord, RecordError> {
    let record: VoteRecord = serde_json::from_slice(payload)?;
    if record.voter_id.trim().is_empty() {
        return Err(RecordError::EmptyVoterId);
    }
    Ok(record)
}

/// Where the consumer loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerPhase {
    Disconnected,
    Connecting,
    Polling,
    Applying,
    Stopped,
}

impl ConsumerPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsumerPhase::Disconnected => "disconnected",
            ConsumerPhase::Connecting => "connecting",
            ConsumerPhase::Polling => "polling",
            ConsumerPhase::Applying => "applying",
            ConsumerPhase::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ConsumerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing queued.
    Empty,
    Applied(UpsertOutcome),
    /// The record was discarded.
    Malformed,
    WriteFailed {
        requeued: bool,
        connection_lost: bool,
    },
    /// The queue connection dropped; nothing was popped.
    QueueLost,
    /// The queue answered with an error; nothing was popped.
    QueueFailed,
}

/// QueueConsumer drains the vote queue into the vote store.
pub struct QueueConsumer<Q, S> {
    queue_connector: Q,
    store_connector: S,
    config: ConsumerConfig,
    phase_tx: watch::Sender<ConsumerPhase>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<Q, S> QueueConsumer<Q, S>
where
    Q: Connector,
    Q::Connection: VoteQueue,
    S: Connector,
    S::Connection: VoteStore,
{
    /// Create a new QueueConsumer.
    ///
    /// # Arguments
    ///
    /// * `queue_connector` - Opens connections to the vote queue
    /// * `store_connector` - Opens connections to the vote store
    /// * `config` - Poll cadence, retry policy and write-failure policy
    /// * `shutdown_rx` - Receiver for shutdown signal
    pub fn new(
        queue_connector: Q,
        store_connector: S,
        config: ConsumerConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let (phase_tx, _) = watch::channel(ConsumerPhase::Disconnected);
        Self {
            queue_connector,
            store_connector,
            config,
            phase_tx,
            shutdown_rx,
        }
    }

    /// Observe phase transitions (used by the health endpoint).
    pub fn subscribe_phase(&self) -> watch::Receiver<ConsumerPhase> {
        self.phase_tx.subscribe()
    }

    /// Run the QueueConsumer until shutdown is signaled.
    pub async fn run(mut self) {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            on_write_failure = ?self.config.on_write_failure,
            "QueueConsumer started"
        );

        let mut queue: Option<Q::Connection> = None;
        let mut store: Option<S::Connection> = None;

        loop {
            if shutdown_flagged(&self.shutdown_rx) {
                info!("QueueConsumer received shutdown signal");
                break;
            }

            if queue.is_none() {
                queue = establish(
                    &self.queue_connector,
                    self.config.retry,
                    &mut self.shutdown_rx,
                    &self.phase_tx,
                )
                .await;
                if queue.is_none() {
                    continue;
                }
            }

            if store.is_none() {
                store = establish(
                    &self.store_connector,
                    self.config.retry,
                    &mut self.shutdown_rx,
                    &self.phase_tx,
                )
                .await;
                if store.is_none() {
                    continue;
                }
            }

            let (Some(q), Some(s)) = (queue.as_mut(), store.as_ref()) else {
                continue;
            };
            self.set_phase(ConsumerPhase::Polling);

            let outcome = self.poll_once(q, s).await;
            match outcome {
                PollOutcome::Empty | PollOutcome::QueueFailed => {
                    tokio::select! {
                        biased;
                        _ = shutdown_requested(&mut self.shutdown_rx) => {}
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
                PollOutcome::QueueLost => {
                    queue = None;
                    self.set_phase(ConsumerPhase::Disconnected);
                }
                PollOutcome::WriteFailed {
                    connection_lost: true,
                    ..
                } => {
                    store = None;
                    self.set_phase(ConsumerPhase::Disconnected);
                }
                PollOutcome::Applied(_)
                | PollOutcome::Malformed
                | PollOutcome::WriteFailed { .. } => {}
            }
        }

        self.set_phase(ConsumerPhase::Stopped);
        info!("QueueConsumer shutdown complete");
    }

    /// Pop one record and apply it.
    pub async fn poll_once(&self, queue: &mut Q::Connection, store: &S::Connection) -> PollOutcome {
        let payload = match queue.pop().await {
            Ok(Some(payload)) => payload,
            Ok(None) => return PollOutcome::Empty,
            Err(e) if e.is_connection_error() => {
                warn!(error = %e, "Lost queue connection");
                return PollOutcome::QueueLost;
            }
            Err(e) => {
                error!(error = %e, "Failed to pop vote record");
                return PollOutcome::QueueFailed;
            }
        };

        self.set_phase(ConsumerPhase::Applying);
        let outcome = self.apply(queue, store, payload).await;
        self.set_phase(ConsumerPhase::Polling);
        outcome
    }

    async fn apply(
        &self,
        queue: &mut Q::Connection,
        store: &S::Connection,
        payload: Vec<u8>,
    ) -> PollOutcome {
        let record = match decode_record(&payload) {
            Ok(record) => record,
            Err(e) => {
                error!(
                    error = %e,
                    payload = %String::from_utf8_lossy(&payload),
                    "Dropping malformed vote record"
                );
                return PollOutcome::Malformed;
            }
        };

        let upsert = UpsertVote {
            voter_id: record.voter_id.clone(),
            vote: record.vote,
            cast_at: now_primitive(),
        };

        let e = match store.upsert(upsert).await {
            Ok(outcome) => {
                info!(
                    voter_id = %record.voter_id,
                    vote = %record.vote,
                    ?outcome,
                    "Applied vote"
                );
                return PollOutcome::Applied(outcome);
            }
            Err(e) => e,
        };

        let connection_lost = e.is_connection_error();
        error!(
            voter_id = %record.voter_id,
            vote = %record.vote,
            error = %e,
            connection_lost,
            "Failed to apply vote"
        );

        // Only a lost connection is worth retrying; any other write error
        // would fail the same way on every redelivery.
        let requeued = match self.config.on_write_failure {
            WriteFailurePolicy::Requeue if connection_lost => match queue.requeue(&payload).await {
                Ok(()) => {
                    info!(voter_id = %record.voter_id, "Requeued vote for retry");
                    true
                }
                Err(qe) => {
                    error!(
                        voter_id = %record.voter_id,
                        error = %qe,
                        "Failed to requeue vote, vote lost"
                    );
                    false
                }
            },
            _ => {
                warn!(
                    voter_id = %record.voter_id,
                    vote = %record.vote,
                    "Vote dropped after failed write"
                );
                false
            }
        };

        PollOutcome::WriteFailed {
            requeued,
            connection_lost,
        }
    }

    fn set_phase(&self, phase: ConsumerPhase) {
        let previous = self.phase_tx.send_replace(phase);
        if previous != phase {
            debug!(from = %previous, to = %phase, "QueueConsumer phase changed");
        }
    }
}

/// Connect one dependency, mirroring its link state into the consumer phase.
async fn establish<C: Connector>(
    connector: &C,
    policy: RetryPolicy,
    shutdown_rx: &mut watch::Receiver<bool>,
    phase_tx: &watch::Sender<ConsumerPhase>,
) -> Option<C::Connection> {
    connect_with_retry(connector, policy, shutdown_rx, |state| {
        let phase = match state {
            ConnectionState::Disconnected => ConsumerPhase::Disconnected,
            ConnectionState::Connecting { .. } => ConsumerPhase::Connecting,
            ConnectionState::Connected => return,
        };
        phase_tx.send_replace(phase);
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueError;
    use crate::store::StoreError;
    use crate::testing::{FlakyConnector, MemoryQueue, MemoryStore};
    use ballot_sdk::objects::BallotChoice;
    use std::time::Duration;

    type TestConsumer = QueueConsumer<FlakyConnector<MemoryQueue>, FlakyConnector<MemoryStore>>;

    fn consumer(
        queue: &MemoryQueue,
        store: &MemoryStore,
        on_write_failure: WriteFailurePolicy,
    ) -> (TestConsumer, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = ConsumerConfig {
            on_write_failure,
            ..ConsumerConfig::default()
        };
        let consumer = QueueConsumer::new(
            FlakyConnector::new("queue", 0, queue.clone()),
            FlakyConnector::new("store", 0, store.clone()),
            config,
            shutdown_rx,
        );
        (consumer, shutdown_tx)
    }

    async fn drain(consumer: &TestConsumer, queue: &MemoryQueue, store: &MemoryStore) -> Vec<PollOutcome> {
        let mut q = queue.clone();
        let mut outcomes = Vec::new();
        loop {
            match consumer.poll_once(&mut q, store).await {
                PollOutcome::Empty => return outcomes,
                outcome => outcomes.push(outcome),
            }
        }
    }

    #[test]
    fn test_decode_rejects_bad_payloads() {
        assert!(matches!(decode_record(b"not json"), Err(RecordError::Json(_))));
        assert!(matches!(
            decode_record(br#"{"vote":"z","voter_id":"v"}"#),
            Err(RecordError::Json(_))
        ));
        assert!(matches!(
            decode_record(br#"{"vote":"a","voter_id":"  "}"#),
            Err(RecordError::EmptyVoterId)
        ));
        assert!(decode_record(&[0xff, 0xfe]).is_err());
        assert_eq!(
            decode_record(br#"{"vote":"a","voter_id":"v"}"#).unwrap(),
            VoteRecord::new(BallotChoice::A, "v")
        );
    }

    #[tokio::test]
    async fn test_same_vote_twice_keeps_one_row() {
        let queue = MemoryQueue::with_records(&[
            r#"{"vote":"a","voter_id":"x"}"#,
            r#"{"vote":"a","voter_id":"x"}"#,
        ]);
        let store = MemoryStore::default();
        let (consumer, _shutdown) = consumer(&queue, &store, WriteFailurePolicy::Drop);

        let outcomes = drain(&consumer, &queue, &store).await;

        assert_eq!(
            outcomes,
            vec![
                PollOutcome::Applied(UpsertOutcome::Inserted),
                PollOutcome::Applied(UpsertOutcome::Updated),
            ]
        );
        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].voter_id, "x");
        assert_eq!(rows[0].vote, BallotChoice::A);
    }

    #[tokio::test]
    async fn test_latest_vote_wins() {
        let queue = MemoryQueue::with_records(&[
            r#"{"vote":"a","voter_id":"x"}"#,
            r#"{"vote":"b","voter_id":"x"}"#,
        ]);
        let store = MemoryStore::default();
        let (consumer, _shutdown) = consumer(&queue, &store, WriteFailurePolicy::Drop);

        drain(&consumer, &queue, &store).await;

        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].vote, BallotChoice::B);
        assert!(rows[0].cast_at >= rows[0].recorded_at);
    }

    #[tokio::test]
    async fn test_voters_are_independent() {
        let queue = MemoryQueue::with_records(&[
            r#"{"vote":"a","voter_id":"x"}"#,
            r#"{"vote":"b","voter_id":"y"}"#,
        ]);
        let store = MemoryStore::default();
        let (consumer, _shutdown) = consumer(&queue, &store, WriteFailurePolicy::Drop);

        drain(&consumer, &queue, &store).await;

        assert_eq!(store.rows().len(), 2);
        let counts = store.counts();
        assert_eq!(counts.get(BallotChoice::A), 1);
        assert_eq!(counts.get(BallotChoice::B), 1);
    }

    #[tokio::test]
    async fn test_malformed_records_do_not_block_valid_ones() {
        let queue = MemoryQueue::with_records(&[
            "{{{",
            r#"{"vote":"c","voter_id":"x"}"#,
            r#"{"voter_id":"x"}"#,
            r#"{"vote":"b","voter_id":"x"}"#,
        ]);
        let store = MemoryStore::default();
        let (consumer, _shutdown) = consumer(&queue, &store, WriteFailurePolicy::Drop);

        let outcomes = drain(&consumer, &queue, &store).await;

        assert_eq!(
            outcomes,
            vec![
                PollOutcome::Malformed,
                PollOutcome::Malformed,
                PollOutcome::Malformed,
                PollOutcome::Applied(UpsertOutcome::Inserted),
            ]
        );
        assert_eq!(queue.pending(), 0);
        assert_eq!(store.counts().get(BallotChoice::B), 1);
    }

    #[tokio::test]
    async fn test_drop_policy_loses_failed_write() {
        let queue = MemoryQueue::with_records(&[r#"{"vote":"a","voter_id":"x"}"#]);
        let store = MemoryStore::default();
        store.fail_next_write(StoreError::Connection("connection reset".into()));
        let (consumer, _shutdown) = consumer(&queue, &store, WriteFailurePolicy::Drop);

        let outcomes = drain(&consumer, &queue, &store).await;

        assert_eq!(
            outcomes,
            vec![PollOutcome::WriteFailed {
                requeued: false,
                connection_lost: true
            }]
        );
        assert_eq!(queue.pending(), 0);
        assert!(store.rows().is_empty());
    }

    #[tokio::test]
    async fn test_requeue_policy_retries_failed_write() {
        let queue = MemoryQueue::with_records(&[
            r#"{"vote":"a","voter_id":"x"}"#,
            r#"{"vote":"b","voter_id":"y"}"#,
        ]);
        let store = MemoryStore::default();
        store.fail_next_write(StoreError::Connection("connection reset".into()));
        let (consumer, _shutdown) = consumer(&queue, &store, WriteFailurePolicy::Requeue);

        let mut q = queue.clone();
        assert_eq!(
            consumer.poll_once(&mut q, &store).await,
            PollOutcome::WriteFailed {
                requeued: true,
                connection_lost: true
            }
        );
        assert_eq!(queue.pending(), 2);

        // The requeued record goes first.
        assert_eq!(
            consumer.poll_once(&mut q, &store).await,
            PollOutcome::Applied(UpsertOutcome::Inserted)
        );
        assert_eq!(store.rows()[0].voter_id, "x");
    }

    #[tokio::test]
    async fn test_requeue_policy_drops_non_transient_failure() {
        let queue = MemoryQueue::with_records(&[r#"{"vote":"a","voter_id":"x"}"#]);
        let store = MemoryStore::default();
        store.fail_next_write(StoreError::Query("check constraint violated".into()));
        let (consumer, _shutdown) = consumer(&queue, &store, WriteFailurePolicy::Requeue);

        let outcomes = drain(&consumer, &queue, &store).await;

        assert_eq!(
            outcomes,
            vec![PollOutcome::WriteFailed {
                requeued: false,
                connection_lost: false
            }]
        );
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_queue_errors_are_classified() {
        let queue = MemoryQueue::default();
        queue.fail_next_pop(QueueError::Connection("broken pipe".into()));
        queue.fail_next_pop(QueueError::Command("WRONGTYPE".into()));
        let store = MemoryStore::default();
        let (consumer, _shutdown) = consumer(&queue, &store, WriteFailurePolicy::Drop);

        let mut q = queue.clone();
        assert_eq!(consumer.poll_once(&mut q, &store).await, PollOutcome::QueueLost);
        assert_eq!(consumer.poll_once(&mut q, &store).await, PollOutcome::QueueFailed);
        assert_eq!(consumer.poll_once(&mut q, &store).await, PollOutcome::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_before_store_is_reachable() {
        let queue = MemoryQueue::with_records(&[
            r#"{"vote":"a","voter_id":"x"}"#,
            r#"{"vote":"b","voter_id":"y"}"#,
        ]);
        let store = MemoryStore::default();
        let store_connector = FlakyConnector::new("store", 3, store.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let consumer = QueueConsumer::new(
            FlakyConnector::new("queue", 0, queue.clone()),
            store_connector,
            ConsumerConfig::default(),
            shutdown_rx,
        );
        let phase = consumer.subscribe_phase();
        let handle = tokio::spawn(consumer.run());

        // Still retrying the store: nothing may be popped yet.
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(queue.pending(), 2);
        assert!(store.rows().is_empty());
        assert_ne!(*phase.borrow(), ConsumerPhase::Polling);

        // Fourth attempt lands at t=3s; both records are applied right away.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(queue.pending(), 0);
        assert_eq!(store.rows().len(), 2);
        assert_eq!(*phase.borrow(), ConsumerPhase::Polling);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(*phase.borrow(), ConsumerPhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_store_after_connection_loss() {
        let queue = MemoryQueue::with_records(&[r#"{"vote":"a","voter_id":"x"}"#]);
        let store = MemoryStore::default();
        store.fail_next_write(StoreError::Connection("server closed the connection".into()));
        let store_connector = FlakyConnector::new("store", 0, store.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let consumer = QueueConsumer::new(
            FlakyConnector::new("queue", 0, queue.clone()),
            store_connector,
            ConsumerConfig {
                on_write_failure: WriteFailurePolicy::Requeue,
                ..ConsumerConfig::default()
            },
            shutdown_rx,
        );
        let handle = tokio::spawn(consumer.run());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(store.rows().len(), 1);
        assert_eq!(queue.pending(), 0);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
