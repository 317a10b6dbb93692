//! The durable FIFO vote queue.
//!
//! Producers append serialized [`VoteRecord`](ballot_sdk::objects::VoteRecord)s
//! to the tail; the consumer takes them from the head. A record that must be
//! retried goes back to the head so it is the next one taken.

pub mod redis;

pub use self::redis::{RedisQueueConnector, RedisVoteQueue};

use crate::BoxError;
use std::future::Future;
use thiserror::Error;

/// Name of the queue list when none is configured.
pub const DEFAULT_QUEUE_NAME: &str = "votes";

#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue server could not be reached or the link dropped.
    #[error("queue unreachable: {0}")]
    Connection(#[source] BoxError),

    /// The server answered with an error.
    #[error("queue command failed: {0}")]
    Command(#[source] BoxError),
}

impl QueueError {
    pub fn is_connection_error(&self) -> bool {
        matches!(self, QueueError::Connection(_))
    }
}

/// Operations on the vote queue.
///
/// Payloads are raw bytes: decoding (and rejecting malformed records) is the
/// consumer's job.
pub trait VoteQueue: Send {
    /// Append a record at the tail.
    fn push(&mut self, payload: &[u8]) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// Put a record back at the head, ahead of everything still queued.
    fn requeue(&mut self, payload: &[u8]) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// Take the oldest record, or `None` if the queue is empty. Never blocks.
    fn pop(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>, QueueError>> + Send;

    fn ping(&mut self) -> impl Future<Output = Result<(), QueueError>> + Send;
}
