//! In-memory doubles for the queue, the store, and the live channel.

use crate::entities::{StoredVote, TallySnapshot, UpsertOutcome, UpsertVote};
use crate::events::{LiveBroadcast, LiveMessage};
use crate::queue::{QueueError, VoteQueue};
use crate::store::{StoreError, VoteStore};
use crate::utils::window_start;
use crate::utils::retry::Connector;
use ballot_sdk::objects::Scores;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Fails `failures` times, then hands out clones of `value`.
pub struct FlakyConnector<T> {
    name: &'static str,
    failures: u32,
    attempts: AtomicU32,
    value: T,
}

impl<T> FlakyConnector<T> {
    pub fn new(name: &'static str, failures: u32, value: T) -> Self {
        Self {
            name,
            failures,
            attempts: AtomicU32::new(0),
            value,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl<T: Clone + Send + Sync> Connector for FlakyConnector<T> {
    type Connection = T;
    type Error = String;

    fn name(&self) -> &'static str {
        self.name
    }

    async fn connect(&self) -> Result<T, String> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            Err(format!("{} refused connection", self.name))
        } else {
            Ok(self.value.clone())
        }
    }
}

// -- Queue ----------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MemoryQueue {
    items: Arc<Mutex<VecDeque<Vec<u8>>>>,
    pop_failures: Arc<Mutex<VecDeque<QueueError>>>,
}

impl MemoryQueue {
    pub fn with_records(records: &[&str]) -> Self {
        let queue = Self::default();
        lock(&queue.items).extend(records.iter().map(|r| r.as_bytes().to_vec()));
        queue
    }

    pub fn pending(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn fail_next_pop(&self, error: QueueError) {
        lock(&self.pop_failures).push_back(error);
    }
}

impl VoteQueue for MemoryQueue {
    async fn push(&mut self, payload: &[u8]) -> Result<(), QueueError> {
        lock(&self.items).push_back(payload.to_vec());
        Ok(())
    }

    async fn requeue(&mut self, payload: &[u8]) -> Result<(), QueueError> {
        lock(&self.items).push_front(payload.to_vec());
        Ok(())
    }

    async fn pop(&mut self) -> Result<Option<Vec<u8>>, QueueError> {
        if let Some(e) = lock(&self.pop_failures).pop_front() {
            return Err(e);
        }
        Ok(lock(&self.items).pop_front())
    }

    async fn ping(&mut self) -> Result<(), QueueError> {
        Ok(())
    }
}

// -- Store ----------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    rows: HashMap<String, StoredVote>,
    next_id: i32,
    write_failures: VecDeque<StoreError>,
    tally_failures: VecDeque<StoreError>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn fail_next_write(&self, error: StoreError) {
        lock(&self.state).write_failures.push_back(error);
    }

    pub fn fail_next_tally(&self, error: StoreError) {
        lock(&self.state).tally_failures.push_back(error);
    }

    pub fn rows(&self) -> Vec<StoredVote> {
        let mut rows: Vec<_> = lock(&self.state).rows.values().cloned().collect();
        rows.sort_by_key(|r| r.id);
        rows
    }

    pub fn counts(&self) -> Scores {
        let state = lock(&self.state);
        let mut scores = Scores::new();
        for row in state.rows.values() {
            scores.set(row.vote, scores.get(row.vote) + 1);
        }
        scores
    }
}

impl VoteStore for MemoryStore {
    async fn upsert(&self, vote: UpsertVote) -> Result<UpsertOutcome, StoreError> {
        let mut state = lock(&self.state);
        if let Some(e) = state.write_failures.pop_front() {
            return Err(e);
        }

        if let Some(row) = state.rows.get_mut(vote.voter_id.as_str()) {
            if row.cast_at > vote.cast_at {
                return Ok(UpsertOutcome::Superseded);
            }
            row.vote = vote.vote;
            row.cast_at = vote.cast_at;
            return Ok(UpsertOutcome::Updated);
        }

        state.next_id += 1;
        let row = StoredVote {
            id: state.next_id,
            vote: vote.vote,
            voter_id: vote.voter_id.to_string(),
            cast_at: vote.cast_at,
            recorded_at: vote.cast_at,
        };
        state.rows.insert(row.voter_id.clone(), row);
        Ok(UpsertOutcome::Inserted)
    }

    async fn tally(&self, recent_window: time::Duration) -> Result<TallySnapshot, StoreError> {
        if let Some(e) = lock(&self.state).tally_failures.pop_front() {
            return Err(e);
        }
        let since = window_start(recent_window);
        let recent = lock(&self.state)
            .rows
            .values()
            .filter(|r| since.is_none_or(|since| r.cast_at >= since))
            .count() as i64;
        Ok(TallySnapshot::new(
            self.counts(),
            recent,
            time::OffsetDateTime::now_utc(),
        ))
    }

    async fn get_vote(&self, voter_id: &str) -> Result<Option<StoredVote>, StoreError> {
        Ok(lock(&self.state).rows.get(voter_id).cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// -- Live channel ---------------------------------------------------------

#[derive(Clone, Default)]
pub struct RecordingLive {
    sent: Arc<Mutex<Vec<LiveMessage>>>,
}

impl RecordingLive {
    pub fn sent(&self) -> Vec<LiveMessage> {
        lock(&self.sent).clone()
    }

    /// Only the `scores` frames.
    pub fn scores(&self) -> Vec<Scores> {
        lock(&self.sent)
            .iter()
            .filter_map(|m| match m {
                LiveMessage::Scores(s) => Some(s.clone()),
                LiveMessage::Stats(_) => None,
            })
            .collect()
    }
}

impl LiveBroadcast for RecordingLive {
    fn broadcast(&self, message: LiveMessage) {
        lock(&self.sent).push(message);
    }
}
