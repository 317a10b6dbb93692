use super::{StoreError, VoteStore};
use crate::entities::votes::{CountRecentVotes, GetStoredVote, GetVoteCounts, PingDatabase};
use crate::entities::{StoredVote, TallySnapshot, UpsertOutcome, UpsertVote};
use crate::framework::DatabaseProcessor;
use crate::utils::window_start;
use crate::utils::retry::Connector;
use kanau::processor::Processor;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// SQLSTATE classes that mean the session itself is gone.
const CONNECTION_SQLSTATES: &[&str] = &["08", "57P01", "57P02", "57P03"];

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        let connection_lost = match &e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => true,
            sqlx::Error::Database(db) => db
                .code()
                .is_some_and(|code| CONNECTION_SQLSTATES.iter().any(|p| code.starts_with(p))),
            _ => false,
        };

        if connection_lost {
            StoreError::Connection(Box::new(e))
        } else {
            StoreError::Query(Box::new(e))
        }
    }
}

/// [`VoteStore`] backed by the Postgres `votes` table.
#[derive(Debug, Clone)]
pub struct PgVoteStore {
    processor: DatabaseProcessor,
}

impl PgVoteStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            processor: DatabaseProcessor { pool },
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.processor.pool
    }
}

impl VoteStore for PgVoteStore {
    async fn upsert(&self, vote: UpsertVote) -> Result<UpsertOutcome, StoreError> {
        Ok(self.processor.process(vote).await?)
    }

    async fn tally(&self, recent_window: time::Duration) -> Result<TallySnapshot, StoreError> {
        let computed_at = time::OffsetDateTime::now_utc();
        let counts = self.processor.process(GetVoteCounts).await?;
        let recent = match window_start(recent_window) {
            Some(since) => self.processor.process(CountRecentVotes { since }).await?,
            None => counts.total(),
        };
        Ok(TallySnapshot::new(counts, recent, computed_at))
    }

    async fn get_vote(&self, voter_id: &str) -> Result<Option<StoredVote>, StoreError> {
        let query = GetStoredVote {
            voter_id: voter_id.into(),
        };
        Ok(self.processor.process(query).await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(self.processor.process(PingDatabase).await?)
    }
}

/// Opens a fresh [`PgVoteStore`] pool per call, so each component owns
/// its own pool.
#[derive(Debug, Clone)]
pub struct PgStoreConnector {
    url: String,
    max_connections: u32,
    acquire_timeout: Duration,
}

impl PgStoreConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }
}

impl Connector for PgStoreConnector {
    type Connection = PgVoteStore;
    type Error = StoreError;

    fn name(&self) -> &'static str {
        "store"
    }

    async fn connect(&self) -> Result<PgVoteStore, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(&self.url)
            .await?;
        Ok(PgVoteStore::new(pool))
    }
}
