//! WebSocket transport to real relays.
//!
//! One text frame per message. Pings are answered inline; binary frames
//! are ignored since relays never send them.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use super::connection::{RelayConnection, RelayConnector, RelayError};
use super::message::{ClientMessage, RelayMessage};

/// Connects over `ws://` or `wss://` (TLS via rustls + webpki roots).
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RelayConnector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn RelayConnection>, RelayError> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| RelayError::Unreachable {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        debug!(relay = url, "websocket connected");

        Ok(Box::new(WebSocketConnection {
            url: url.to_string(),
            ws,
        }))
    }
}

struct WebSocketConnection {
    url: String,
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl RelayConnection for WebSocketConnection {
    fn url(&self) -> &str {
        &self.url
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<(), RelayError> {
        let text = message.to_json()?;
        trace!(relay = %self.url, frame = %text, "-> relay");
        self.ws
            .send(Message::Text(text))
            .await
            .map_err(|_| RelayError::Closed)
    }

    async fn recv(&mut self) -> Result<RelayMessage, RelayError> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    trace!(relay = %self.url, frame = %text, "<- relay");
                    return RelayMessage::from_json(&text);
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = self.ws.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => return Err(RelayError::Closed),
                Some(Err(e)) => {
                    debug!(relay = %self.url, error = %e, "websocket read failed");
                    return Err(RelayError::Closed);
                }
                Some(Ok(_)) => continue,
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }
}
