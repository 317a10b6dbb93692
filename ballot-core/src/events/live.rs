use ballot_sdk::objects::LiveMessage;
use tokio::sync::broadcast;
use tracing::trace;

/// Frames a slow subscriber may fall behind before it starts skipping.
pub const DEFAULT_LIVE_BUFFER: usize = 64;

pub type LiveReceiver = broadcast::Receiver<LiveMessage>;

/// Fire-and-forget delivery to every currently connected subscriber.
pub trait LiveBroadcast: Send + Sync {
    fn broadcast(&self, message: LiveMessage);
}

/// Registry of live subscribers.
#[derive(Debug, Clone)]
pub struct LiveRegistry {
    tx: broadcast::Sender<LiveMessage>,
}

impl LiveRegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LIVE_BUFFER)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Register a new subscriber. It receives every message broadcast
    /// after this call.
    pub fn subscribe(&self) -> LiveReceiver {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LiveRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveBroadcast for LiveRegistry {
    fn broadcast(&self, message: LiveMessage) {
        // Err only means nobody is listening.
        match self.tx.send(message) {
            Ok(n) => trace!(subscribers = n, "Broadcast live message"),
            Err(_) => trace!("No live subscribers"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_sdk::objects::Scores;

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let registry = LiveRegistry::new();
        let mut first = registry.subscribe();
        let mut second = registry.subscribe();
        assert_eq!(registry.subscriber_count(), 2);

        registry.broadcast(LiveMessage::Scores(Scores::new()));

        assert_eq!(first.recv().await.unwrap(), LiveMessage::Scores(Scores::new()));
        assert_eq!(second.recv().await.unwrap(), LiveMessage::Scores(Scores::new()));
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        LiveRegistry::new().broadcast(LiveMessage::Scores(Scores::new()));
    }
}
