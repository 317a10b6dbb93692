//! Durable vote storage.
//!
//! [`VoteStore`] is what the consumer, the broadcaster, and the HTTP layer
//! need from the store. The Postgres implementation lives in [`postgres`].

pub mod postgres;

pub use postgres::{PgStoreConnector, PgVoteStore};

use crate::BoxError;
use crate::entities::{StoredVote, TallySnapshot, UpsertOutcome, UpsertVote};
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or the link dropped mid-query.
    #[error("store unreachable: {0}")]
    Connection(#[source] BoxError),

    /// The store rejected or failed the statement.
    #[error("store query failed: {0}")]
    Query(#[source] BoxError),
}

impl StoreError {
    pub fn is_connection_error(&self) -> bool {
        matches!(self, StoreError::Connection(_))
    }
}

pub trait VoteStore: Send + Sync {
    /// Apply one vote atomically. See [`UpsertVote`].
    fn upsert(
        &self,
        vote: UpsertVote,
    ) -> impl Future<Output = Result<UpsertOutcome, StoreError>> + Send;

    /// Aggregate all stored votes. `recent_window` bounds the `recent`
    /// count, measured back from now.
    fn tally(
        &self,
        recent_window: time::Duration,
    ) -> impl Future<Output = Result<TallySnapshot, StoreError>> + Send;

    fn get_vote(
        &self,
        voter_id: &str,
    ) -> impl Future<Output = Result<Option<StoredVote>, StoreError>> + Send;

    fn ping(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
