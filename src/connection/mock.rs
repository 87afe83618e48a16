//! In-memory transport for tests.
//!
//! [`MockConnector`] hands out transports wired to a shared [`MockServer`]
//! handle. Tests use the handle to push inbound frames, kill the live
//! connection, refuse opens, and inspect what the client sent.

use super::transport::{Connector, Transport, TransportSignal};
use crate::error::{ChatError, Result};
use crate::protocol::OutboundRequest;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

#[derive(Default)]
struct MockState {
    opens: u32,
    refuse_next: u32,
    refuse_all: bool,
    fail_sends: bool,
    live: Option<mpsc::UnboundedSender<TransportSignal>>,
    sent: Vec<String>,
    client_closes: u32,
}

/// Test-side handle on the fake server
#[derive(Clone, Default)]
pub struct MockServer {
    state: Arc<Mutex<MockState>>,
}

impl MockServer {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver a raw text frame on the live connection.
    ///
    /// Returns false when no connection is live.
    pub fn push_frame(&self, raw: impl Into<String>) -> bool {
        let state = self.lock();
        match &state.live {
            Some(tx) => tx.send(TransportSignal::Message(raw.into())).is_ok(),
            None => false,
        }
    }

    /// Deliver a JSON frame on the live connection
    pub fn push_json(&self, frame: serde_json::Value) -> bool {
        self.push_frame(frame.to_string())
    }

    /// Abnormally close the live connection
    pub fn drop_connection(&self, reason: &str) -> bool {
        let live = self.lock().live.take();
        match live {
            Some(tx) => tx
                .send(TransportSignal::Closed {
                    reason: reason.to_string(),
                })
                .is_ok(),
            None => false,
        }
    }

    /// Fail the next `n` open attempts
    pub fn refuse_next(&self, n: u32) {
        self.lock().refuse_next = n;
    }

    /// Fail every open attempt until turned off
    pub fn refuse_all(&self, refuse: bool) {
        self.lock().refuse_all = refuse;
    }

    /// Make every client write fail, as with a broken pipe
    pub fn fail_sends(&self, fail: bool) {
        self.lock().fail_sends = fail;
    }

    /// Number of open attempts seen, successful or not
    pub fn open_count(&self) -> u32 {
        self.lock().opens
    }

    /// Number of deliberate closes performed by the client
    pub fn client_close_count(&self) -> u32 {
        self.lock().client_closes
    }

    pub fn is_connected(&self) -> bool {
        self.lock().live.is_some()
    }

    /// Raw frames written by the client, in order
    pub fn sent_frames(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    /// Sent frames parsed as outbound requests (unparsable frames skipped)
    pub fn sent_requests(&self) -> Vec<OutboundRequest> {
        self.lock()
            .sent
            .iter()
            .filter_map(|raw| serde_json::from_str(raw).ok())
            .collect()
    }
}

/// Connector that never touches the network
#[derive(Clone, Default)]
pub struct MockConnector {
    server: MockServer,
}

impl MockConnector {
    pub fn new() -> (Self, MockServer) {
        let server = MockServer::default();
        (
            Self {
                server: server.clone(),
            },
            server,
        )
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, _url: &str) -> Result<Box<dyn Transport>> {
        let mut state = self.server.lock();
        state.opens += 1;
        if state.refuse_all {
            return Err(ChatError::transport("connection refused"));
        }
        if state.refuse_next > 0 {
            state.refuse_next -= 1;
            return Err(ChatError::transport("connection refused"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.live = Some(tx);
        Ok(Box::new(MockTransport {
            inbound: rx,
            server: self.server.clone(),
        }))
    }
}

struct MockTransport {
    inbound: mpsc::UnboundedReceiver<TransportSignal>,
    server: MockServer,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        let mut state = self.server.lock();
        if state.fail_sends {
            return Err(ChatError::transport("broken pipe"));
        }
        state.sent.push(text);
        Ok(())
    }

    async fn next_signal(&mut self) -> TransportSignal {
        self.inbound
            .recv()
            .await
            .unwrap_or_else(|| TransportSignal::Closed {
                reason: "mock server went away".to_string(),
            })
    }

    async fn close(&mut self) {
        let mut state = self.server.lock();
        state.client_closes += 1;
        state.live = None;
    }
}
