//! WebSocket transport built on `tokio-tungstenite`.

use std::sync::Once;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::OracleError;
use crate::message::{ClientMessage, RelayMessage};
use crate::transport::{RelayConnection, RelayTransport};

/// Connects to relays over `ws://` or `wss://`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl RelayTransport for WsTransport {
    type Connection = WsConnection;

    async fn connect(&self, url: &str) -> Result<WsConnection, OracleError> {
        install_crypto_provider();
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| OracleError::Transport(format!("connect {url}: {e}")))?;
        tracing::debug!(url, "connected to oracle relay");
        Ok(WsConnection { stream })
    }
}

/// Installs ring as the process-wide rustls provider for `wss://` handshakes.
fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        // Err means another provider is already installed; that one is used.
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// An open WebSocket to a relay.
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl RelayConnection for WsConnection {
    async fn send(&mut self, msg: ClientMessage) -> Result<(), OracleError> {
        let text = msg.to_json()?;
        self.stream
            .send(Message::text(text))
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Option<RelayMessage>, OracleError> {
        while let Some(frame) = self.stream.next().await {
            match frame.map_err(|e| OracleError::Transport(e.to_string()))? {
                Message::Text(text) => {
                    if let Some(msg) = RelayMessage::parse(text.as_str())? {
                        return Ok(Some(msg));
                    }
                }
                Message::Ping(data) => {
                    self.stream
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| OracleError::Transport(e.to_string()))?;
                }
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }

    async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}
