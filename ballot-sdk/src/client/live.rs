use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::ClientError;
use crate::objects::LiveMessage;

/// Subscriber for the `GET /ws` live tally channel.
pub struct LiveClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl LiveClient {
    /// Connect to `ws_url` (e.g. `ws://localhost:8080/ws`).
    pub async fn connect(ws_url: Url) -> Result<Self, ClientError> {
        let (stream, _response) = connect_async(ws_url.as_str()).await?;
        Ok(Self { stream })
    }

    /// Wait for the next live frame.
    ///
    /// Returns `Ok(None)` once the server closes the connection. Control
    /// frames are skipped.
    pub async fn next_message(&mut self) -> Result<Option<LiveMessage>, ClientError> {
        while let Some(frame) = self.stream.next().await {
            match frame? {
                Message::Text(text) => return Ok(Some(serde_json::from_str(&text)?)),
                Message::Close(_) => return Ok(None),
                _ => continue,
            }
        }
        Ok(None)
    }
}
