use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use ballot_core::entities::TallySnapshot;
use ballot_core::store::VoteStore;
use ballot_sdk::objects::{LiveMessage, OptionLabels};
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

/// `GET /ws` — live tally stream.
///
/// Every viewer first receives a `scores` and a `stats` frame describing the
/// current tally, then every frame the broadcaster emits. Messages sent by
/// the viewer are ignored.
pub(super) async fn live_ws(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_live_ws(socket, state))
}

/// Background task that drives a single viewer connection.
async fn handle_live_ws(mut socket: WebSocket, state: AppState) {
    // Subscribe before the initial sync so a broadcast racing with it is
    // still buffered in the receiver.
    let mut live_rx = state.live.subscribe();
    tracing::debug!(viewers = state.live.subscriber_count(), "Live viewer connected");

    if sync_viewer(&mut socket, &state).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            result = live_rx.recv() => {
                match result {
                    Ok(message) => {
                        if send_json(&mut socket, &message).await.is_err() {
                            return;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "WS: live receiver lagged, resyncing viewer");
                        if sync_viewer(&mut socket, &state).await.is_err() {
                            return;
                        }
                    }
                    Err(RecvError::Closed) => {
                        break;
                    }
                }
            }

            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!("Live viewer disconnected");
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) => {
                        return;
                    }
                }
            }
        }
    }

    let _ = socket.send(Message::Close(None)).await;
}

/// Send the current tally as a `scores` + `stats` pair.
async fn sync_viewer(socket: &mut WebSocket, state: &AppState) -> Result<(), ()> {
    let frames = initial_frames(
        state.snapshots.latest(),
        &state.store,
        state.recent_window,
        state.ballot.current().labels(),
    )
    .await;

    for message in frames.into_iter().flatten() {
        send_json(socket, &message).await?;
    }
    Ok(())
}

/// Frames describing the current tally for a viewer that needs syncing.
///
/// Uses the broadcaster's latest snapshot, or queries the store if the
/// broadcaster has not produced one yet. `None` if that query fails; the
/// viewer then waits for the next change instead of being dropped.
async fn initial_frames<S: VoteStore>(
    latest: Option<TallySnapshot>,
    store: &S,
    recent_window: time::Duration,
    labels: OptionLabels,
) -> Option<[LiveMessage; 2]> {
    let snapshot = match latest {
        Some(snapshot) => snapshot,
        None => match store.tally(recent_window).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "WS: could not load tally for initial sync");
                return None;
            }
        },
    };
    Some(snapshot.live_messages(labels))
}

/// Serialize `value` as JSON and send it as a text WebSocket frame.
///
/// Returns `Err(())` if the send fails (client disconnected).
async fn send_json<T: serde::Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), ()> {
    let json = serde_json::to_string(value).map_err(|_| ())?;
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_core::entities::{StoredVote, UpsertOutcome, UpsertVote};
    use ballot_core::store::StoreError;
    use ballot_sdk::objects::{BallotChoice, Scores};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Answers `tally` with a fixed result and counts the calls.
    struct FixedTally {
        snapshot: Option<TallySnapshot>,
        calls: AtomicU32,
    }

    impl FixedTally {
        fn new(snapshot: Option<TallySnapshot>) -> Self {
            Self {
                snapshot,
                calls: AtomicU32::new(0),
            }
        }
    }

    impl VoteStore for FixedTally {
        async fn upsert(&self, _vote: UpsertVote) -> Result<UpsertOutcome, StoreError> {
            Err(StoreError::Query("read-only".into()))
        }

        async fn tally(&self, _recent_window: time::Duration) -> Result<TallySnapshot, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.snapshot
                .clone()
                .ok_or_else(|| StoreError::Connection("connection refused".into()))
        }

        async fn get_vote(&self, _voter_id: &str) -> Result<Option<StoredVote>, StoreError> {
            Ok(None)
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn snapshot(a: i64, b: i64) -> TallySnapshot {
        let counts: Scores = [(BallotChoice::A, a), (BallotChoice::B, b)]
            .into_iter()
            .collect();
        TallySnapshot::new(counts, 1, time::OffsetDateTime::UNIX_EPOCH)
    }

    fn labels() -> OptionLabels {
        OptionLabels {
            a: "Cats".to_owned(),
            b: "Dogs".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_latest_snapshot_is_sent_without_querying() {
        let store = FixedTally::new(Some(snapshot(9, 9)));

        let frames = initial_frames(Some(snapshot(2, 1)), &store, time::Duration::MINUTE, labels())
            .await
            .unwrap();

        let [LiveMessage::Scores(scores), LiveMessage::Stats(stats)] = frames else {
            panic!("expected scores then stats");
        };
        assert_eq!(scores.get(BallotChoice::A), 2);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.options.b, "Dogs");
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_is_queried_before_first_snapshot() {
        let store = FixedTally::new(Some(snapshot(0, 4)));

        let frames = initial_frames(None, &store, time::Duration::MINUTE, labels())
            .await
            .unwrap();

        let [LiveMessage::Scores(scores), LiveMessage::Stats(_)] = frames else {
            panic!("expected scores then stats");
        };
        assert_eq!(scores.get(BallotChoice::B), 4);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_nothing_sent_when_store_unreachable() {
        let store = FixedTally::new(None);

        let frames = initial_frames(None, &store, time::Duration::MINUTE, labels()).await;

        assert!(frames.is_none());
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }
}
