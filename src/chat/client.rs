//! ChatClient — the narrow interface the UI talks to
//!
//! Wires the connection manager to the turn accumulator and session registry,
//! keeps the finalized message history, and publishes [`ChatUpdate`]s.
//!
//! Lock order is connection state first, client state second: observer
//! callbacks arrive with the connection lock held, so nothing here calls into
//! the connection manager while holding the client lock.

use super::accumulator::TurnAccumulator;
use super::config::ChatConfig;
use super::request::build_request;
use super::session::SessionRegistry;
use super::types::{Message, Turn};
use crate::connection::{ConnectionManager, ConnectionObserver, ConnectionState, Connector};
use crate::credentials::CredentialSource;
use crate::error::{ChatError, Result};
use crate::events::{ChatUpdate, EventBus, UpdateEmitter};
use crate::protocol::{self, WireEvent};
use crate::Config;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a user message was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the open transport. Should the write fail, the fallback
    /// reply follows as for `Fallback`.
    Sent,
    /// The transport was not open; a fallback reply is scheduled
    Fallback,
    /// Blank input, nothing happened
    Ignored,
}

struct ClientState {
    alive: bool,
    history: Vec<Message>,
    accumulator: TurnAccumulator,
    session: SessionRegistry,
}

/// State shared with the connection manager's driver
struct ClientInner {
    state: Mutex<ClientState>,
    bus: EventBus,
    fallback_text: String,
}

impl ClientInner {
    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to history and publish, unless torn down
    fn finalize(&self, state: &mut ClientState, message: Message) {
        debug!(
            message_id = %message.id,
            sender = ?message.sender,
            chars = message.text.chars().count(),
            "Message finalized"
        );
        state.history.push(message.clone());
        self.bus.emit(ChatUpdate::Message { message });
    }

    fn emit_fallback(&self) {
        let mut state = self.lock();
        if !state.alive {
            return;
        }
        info!("Emitting offline fallback reply");
        self.finalize(&mut state, Message::assistant(self.fallback_text.clone()));
    }
}

impl ConnectionObserver for ClientInner {
    fn on_state_change(&self, state: ConnectionState) {
        if self.lock().alive {
            self.bus.emit(ChatUpdate::Status { state });
        }
    }

    fn on_event(&self, event: &WireEvent) {
        let mut state = self.lock();
        if !state.alive {
            return;
        }

        if let WireEvent::ConversationCreated { conversation_id } = event {
            if state.session.on_conversation_created(conversation_id.as_str()) {
                self.bus.emit(ChatUpdate::ConversationChanged {
                    conversation_id: conversation_id.clone(),
                });
            }
            return;
        }

        let applied = state.accumulator.step(event);
        if let Some(message) = applied.finalized {
            self.finalize(&mut state, message);
        }
        if let Some(progress) = applied.progress {
            self.bus.emit_lossy(ChatUpdate::TurnUpdated { progress });
        }
    }

    fn on_reconnect_exhausted(&self, attempts: u32) {
        if self.lock().alive {
            self.bus.emit(ChatUpdate::ReconnectExhausted { attempts });
        }
    }

    /// Each lost request gets the fallback reply right away; the socket is
    /// already known to be broken.
    fn on_send_failed(&self, frames: &[String]) {
        warn!(frames = frames.len(), "Chat request lost on a failed socket");
        for _ in frames {
            self.emit_fallback();
        }
    }
}

/// Streaming chat client
pub struct ChatClient {
    connection: ConnectionManager,
    inner: Arc<ClientInner>,
    credentials: Arc<dyn CredentialSource>,
    config: ChatConfig,
    /// Cancels pending fallback timers on teardown
    shutdown: CancellationToken,
}

impl ChatClient {
    /// Create a client for `config`. Nothing connects until [`connect`](Self::connect).
    pub fn new(
        config: &Config,
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        let connection = ConnectionManager::new(config.url.clone(), config.backoff, connector);
        let inner = Arc::new(ClientInner {
            state: Mutex::new(ClientState {
                alive: true,
                history: Vec::new(),
                accumulator: TurnAccumulator::new(),
                session: SessionRegistry::new(),
            }),
            bus: EventBus::new(config.chat.event_capacity),
            fallback_text: config.chat.fallback_text.clone(),
        });
        connection.add_observer(inner.clone());

        Self {
            connection,
            inner,
            credentials,
            config: config.chat.clone(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Open the socket. Reconnection afterwards is automatic.
    pub fn connect(&self) -> Result<()> {
        self.connection.connect()
    }

    /// Subscribe to finalized messages, status changes and conversation ids.
    ///
    /// Turn previews are dropped while a subscriber lags; a subscriber that
    /// still falls behind far enough to see `Lagged` can recover from
    /// [`history`](Self::history).
    pub fn subscribe(&self) -> broadcast::Receiver<ChatUpdate> {
        self.inner.bus.subscribe()
    }

    pub fn status(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Whether a message sent now would reach the server
    pub fn is_ready(&self) -> bool {
        self.connection.is_open()
    }

    /// Finalized messages in emission order
    pub fn history(&self) -> Vec<Message> {
        self.inner.lock().history.clone()
    }

    /// The assistant turn still streaming, if any
    pub fn pending_turn(&self) -> Option<Turn> {
        self.inner.lock().accumulator.open_turn().cloned()
    }

    pub fn active_conversation_id(&self) -> Option<String> {
        self.inner
            .lock()
            .session
            .active_conversation_id()
            .map(str::to_string)
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Send a user message.
    ///
    /// The user message is published before any network activity. If the
    /// socket is open the request is built from the history and conversation
    /// id as they are right now and sent; otherwise a fallback assistant reply
    /// follows after the configured delay. A missing credential is reported as
    /// an error and nothing is sent.
    pub fn send_user_message(&self, text: &str) -> Result<SendOutcome> {
        if text.trim().is_empty() {
            return Ok(SendOutcome::Ignored);
        }

        let (history, conversation_id) = {
            let mut state = self.inner.lock();
            if !state.alive {
                return Err(ChatError::TornDown);
            }
            let history = state.history.clone();
            let conversation_id = state.session.active_conversation_id().map(str::to_string);
            self.inner.finalize(&mut state, Message::user(text));
            (history, conversation_id)
        };

        if !self.connection.is_open() {
            self.schedule_fallback();
            return Ok(SendOutcome::Fallback);
        }

        let credential = self.credentials.credential().unwrap_or_default();
        let request = build_request(&history, text, &credential, conversation_id.as_deref())
            .inspect_err(|e| warn!(error = %e, "Could not build chat request"))?;
        let frame = protocol::encode(&request)?;

        match self.connection.send(frame) {
            Ok(()) => {
                debug!(
                    conversation_id = ?conversation_id,
                    history_len = history.len(),
                    "Chat request sent"
                );
                Ok(SendOutcome::Sent)
            }
            // closed between the check and the send
            Err(ChatError::NotOpen) => {
                self.schedule_fallback();
                Ok(SendOutcome::Fallback)
            }
            Err(e) => Err(e),
        }
    }

    fn schedule_fallback(&self) {
        warn!(
            state = %self.connection.state(),
            delay_ms = self.config.fallback_delay.as_millis() as u64,
            "Socket not open, scheduling fallback reply"
        );
        let inner = self.inner.clone();
        let shutdown = self.shutdown.clone();
        let delay = self.config.fallback_delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => inner.emit_fallback(),
            }
        });
    }

    /// Close the socket and stop all activity. Idempotent.
    ///
    /// Subscribers see the final `Closed` status; after this returns no
    /// further update is published and no timer fires.
    pub fn teardown(&self) {
        self.connection.teardown();
        {
            let mut state = self.inner.lock();
            if !state.alive {
                return;
            }
            state.alive = false;
        }
        self.shutdown.cancel();
        info!("Chat client torn down");
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        self.teardown();
    }
}
