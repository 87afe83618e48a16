//! Transport seam — opening a socket and exchanging text frames
//!
//! The connection manager only talks to these traits. [`WsConnector`] is the
//! production implementation over `tokio-tungstenite`; tests use
//! [`super::mock::MockConnector`].

use crate::error::{ChatError, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

/// What the transport reports while reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSignal {
    /// One inbound text frame
    Message(String),
    /// The epoch ended, cleanly or with an error
    Closed { reason: String },
}

/// One open socket (one connection epoch)
#[async_trait]
pub trait Transport: Send {
    /// Write one text frame
    async fn send(&mut self, text: String) -> Result<()>;

    /// Wait for the next text frame or the end of the epoch.
    ///
    /// Must be cancel-safe: the manager polls it inside `select!`.
    async fn next_signal(&mut self) -> TransportSignal;

    /// Best-effort deliberate close
    async fn close(&mut self);
}

/// Factory for transports
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &str) -> Result<Box<dyn Transport>>;
}

/// WebSocket connector backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<Box<dyn Transport>> {
        let (stream, response) = connect_async(url).await.map_err(ChatError::transport)?;
        debug!(status = %response.status(), "WebSocket handshake completed");
        Ok(Box::new(WsTransport { stream }))
    }
}

struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(ChatError::transport)
    }

    async fn next_signal(&mut self) -> TransportSignal {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return TransportSignal::Message(text.to_string());
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                        .unwrap_or_else(|| "closed by server".to_string());
                    return TransportSignal::Closed { reason };
                }
                // binary, ping and pong frames carry nothing for us
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return TransportSignal::Closed {
                        reason: e.to_string(),
                    };
                }
                None => {
                    return TransportSignal::Closed {
                        reason: "stream ended".to_string(),
                    };
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "Error while closing WebSocket");
        }
    }
}
