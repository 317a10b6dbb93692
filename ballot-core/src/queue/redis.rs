//! Redis list backend for the vote queue.
//!
//! `RPUSH` appends, `LPOP` takes the oldest record, `LPUSH` requeues at the
//! head. The [`ConnectionManager`] is cheap to clone, so every HTTP handler
//! and the consumer can hold their own handle.

use super::{QueueError, VoteQueue};
use crate::utils::retry::Connector;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

impl From<redis::RedisError> for QueueError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
        {
            QueueError::Connection(Box::new(e))
        } else {
            QueueError::Command(Box::new(e))
        }
    }
}

/// A Redis list used as the vote queue.
#[derive(Clone)]
pub struct RedisVoteQueue {
    conn: ConnectionManager,
    key: String,
}

impl RedisVoteQueue {
    pub fn new(conn: ConnectionManager, key: impl Into<String>) -> Self {
        Self {
            conn,
            key: key.into(),
        }
    }
}

impl VoteQueue for RedisVoteQueue {
    async fn push(&mut self, payload: &[u8]) -> Result<(), QueueError> {
        let _len: i64 = self.conn.rpush(&self.key, payload).await?;
        Ok(())
    }

    async fn requeue(&mut self, payload: &[u8]) -> Result<(), QueueError> {
        let _len: i64 = self.conn.lpush(&self.key, payload).await?;
        Ok(())
    }

    async fn pop(&mut self) -> Result<Option<Vec<u8>>, QueueError> {
        let payload: Option<Vec<u8>> = self.conn.lpop(&self.key, None).await?;
        Ok(payload)
    }

    async fn ping(&mut self) -> Result<(), QueueError> {
        let _pong: String = redis::cmd("PING").query_async(&mut self.conn).await?;
        Ok(())
    }
}

/// Opens [`RedisVoteQueue`] connections.
#[derive(Debug, Clone)]
pub struct RedisQueueConnector {
    url: String,
    key: String,
}

impl RedisQueueConnector {
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: key.into(),
        }
    }
}

impl Connector for RedisQueueConnector {
    type Connection = RedisVoteQueue;
    type Error = QueueError;

    fn name(&self) -> &'static str {
        "queue"
    }

    async fn connect(&self) -> Result<RedisVoteQueue, QueueError> {
        let client = redis::Client::open(self.url.as_str())?;
        let config = redis::aio::ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(CONNECTION_TIMEOUT);
        let conn = client.get_connection_manager_with_config(config).await?;

        let mut queue = RedisVoteQueue::new(conn, self.key.clone());
        queue.ping().await?;
        Ok(queue)
    }
}
