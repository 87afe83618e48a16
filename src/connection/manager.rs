//! ConnectionManager — owns the chat socket and its reconnect loop
//!
//! State machine:
//! - `Idle → Connecting` on `connect()`
//! - `Connecting → Open` when the transport opens (attempt counter reset)
//! - `Open → Closed` when the transport closes or errors
//! - `Closed → Reconnecting` automatically while the attempt budget lasts,
//!   otherwise stays `Closed` and reports `ReconnectExhausted`
//! - `Reconnecting → Connecting` once the backoff delay elapses
//! - any state `→ Closed` on `teardown()`, after which nothing transitions
//!
//! A single driver task runs the loop. All state sits behind one mutex that
//! is never held across `.await`; every transition and every observer call
//! happens under that mutex after checking the liveness flag, so once
//! `teardown()` returns no observer is invoked again.

use super::state::{ConnectionEvent, ConnectionState, ReconnectAttempt};
use super::transport::{Connector, TransportSignal};
use crate::backoff::BackoffPolicy;
use crate::error::{ChatError, Result};
use crate::protocol::{self, WireEvent};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Receives lifecycle changes and decoded frames.
///
/// Callbacks run synchronously on the driver task while the manager's state
/// lock is held, in arrival order. Implementations must not call back into
/// the [`ConnectionManager`] that invokes them.
pub trait ConnectionObserver: Send + Sync {
    fn on_state_change(&self, _state: ConnectionState) {}

    fn on_event(&self, _event: &WireEvent) {}

    fn on_reconnect_exhausted(&self, _attempts: u32) {}

    /// Outbound frames that were accepted by `send` but never written,
    /// because the transport failed or closed first. Called once per
    /// epoch, in queue order.
    fn on_send_failed(&self, _frames: &[String]) {}
}

struct Shared {
    state: ConnectionState,
    attempt: ReconnectAttempt,
    /// Cleared by teardown; nothing transitions afterwards
    alive: bool,
    /// Bumped per driver so a stale driver cannot touch state
    generation: u64,
    /// Outbound queue of the current epoch, present only while `Open`
    outbound: Option<mpsc::UnboundedSender<String>>,
    observers: Vec<Arc<dyn ConnectionObserver>>,
}

impl Shared {
    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        debug!(from = %self.state, to = %state, "Connection state changed");
        self.state = state;
        for observer in &self.observers {
            observer.on_state_change(state);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.alive && self.generation == generation
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of the single live transport
pub struct ConnectionManager {
    url: String,
    policy: BackoffPolicy,
    connector: Arc<dyn Connector>,
    shared: Arc<Mutex<Shared>>,
    shutdown: CancellationToken,
}

impl ConnectionManager {
    pub fn new(url: impl Into<String>, policy: BackoffPolicy, connector: Arc<dyn Connector>) -> Self {
        Self {
            url: url.into(),
            policy,
            connector,
            shared: Arc::new(Mutex::new(Shared {
                state: ConnectionState::Idle,
                attempt: ReconnectAttempt::reset(&policy),
                alive: true,
                generation: 0,
                outbound: None,
                observers: Vec::new(),
            })),
            shutdown: CancellationToken::new(),
        }
    }

    /// Register an observer. Observers added later miss earlier events.
    pub fn add_observer(&self, observer: Arc<dyn ConnectionObserver>) {
        lock(&self.shared).observers.push(observer);
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.shared).state
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn attempt(&self) -> ReconnectAttempt {
        lock(&self.shared).attempt
    }

    /// False once `teardown()` has run
    pub fn is_alive(&self) -> bool {
        lock(&self.shared).alive
    }

    /// Start the connection loop.
    ///
    /// No-op while a transport is open, being opened, or waiting to reconnect.
    /// From `Closed` after reconnect exhaustion this is a manual retry with a
    /// fresh attempt budget. Must be called inside a tokio runtime.
    pub fn connect(&self) -> Result<()> {
        let generation = {
            let mut shared = lock(&self.shared);
            if !shared.alive {
                return Err(ChatError::TornDown);
            }
            if shared.state.is_active() {
                debug!(state = %shared.state, "connect() ignored, connection already active");
                return Ok(());
            }
            shared.generation += 1;
            shared.attempt = ReconnectAttempt::reset(&self.policy);
            shared.set_state(ConnectionState::Connecting);
            shared.generation
        };

        let driver = Driver {
            url: self.url.clone(),
            policy: self.policy,
            connector: self.connector.clone(),
            shared: self.shared.clone(),
            shutdown: self.shutdown.clone(),
            generation,
        };
        tokio::spawn(driver.run());
        Ok(())
    }

    /// Queue one text frame on the open transport.
    ///
    /// Fails with [`ChatError::NotOpen`] in any state but `Open`; the caller
    /// owns the fallback.
    pub fn send(&self, raw: String) -> Result<()> {
        let shared = lock(&self.shared);
        if !shared.alive {
            return Err(ChatError::TornDown);
        }
        if shared.state != ConnectionState::Open {
            return Err(ChatError::NotOpen);
        }
        match &shared.outbound {
            Some(tx) => tx.send(raw).map_err(|_| ChatError::NotOpen),
            None => Err(ChatError::NotOpen),
        }
    }

    /// Deliberately close the connection. Idempotent.
    ///
    /// After this returns no pending backoff timer fires, no observer is
    /// called, and the driver closes the socket without reconnecting.
    pub fn teardown(&self) {
        {
            let mut shared = lock(&self.shared);
            if !shared.alive {
                return;
            }
            info!(url = %self.url, state = %shared.state, "Tearing down chat connection");
            shared.outbound = None;
            if shared.state == ConnectionState::Open {
                shared.set_state(ConnectionState::Closing);
            }
            shared.set_state(ConnectionState::Closed);
            shared.alive = false;
        }
        self.shutdown.cancel();
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

// ============================================================================
// Driver task
// ============================================================================

struct Driver {
    url: String,
    policy: BackoffPolicy,
    connector: Arc<dyn Connector>,
    shared: Arc<Mutex<Shared>>,
    shutdown: CancellationToken,
    generation: u64,
}

impl Driver {
    async fn run(self) {
        loop {
            let opened = tokio::select! {
                _ = self.shutdown.cancelled() => return,
                result = self.connector.open(&self.url) => result,
            };

            match opened {
                Ok(mut transport) => {
                    let (tx, mut outbound) = mpsc::unbounded_channel::<String>();
                    if !self.on_open(tx) {
                        transport.close().await;
                        return;
                    }

                    let (reason, failed) = loop {
                        tokio::select! {
                            biased;
                            _ = self.shutdown.cancelled() => {
                                transport.close().await;
                                return;
                            }
                            Some(raw) = outbound.recv() => {
                                if let Err(e) = transport.send(raw.clone()).await {
                                    break (e.to_string(), Some(raw));
                                }
                            }
                            signal = transport.next_signal() => match signal {
                                TransportSignal::Message(raw) => {
                                    let Some(event) = protocol::decode(&raw) else {
                                        continue;
                                    };
                                    if !self.dispatch(event) {
                                        transport.close().await;
                                        return;
                                    }
                                }
                                TransportSignal::Closed { reason } => break (reason, None),
                            },
                        }
                    };
                    warn!(url = %self.url, reason = %reason, "Chat socket closed");

                    // later `send` calls fail fast with NotOpen from here on
                    outbound.close();
                    let mut unsent: Vec<String> = failed.into_iter().collect();
                    while let Ok(raw) = outbound.try_recv() {
                        unsent.push(raw);
                    }
                    if !unsent.is_empty() && !self.report_unsent(&unsent) {
                        return;
                    }
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, "Failed to open chat socket");
                }
            }

            let Some(delay) = self.on_closed() else {
                return;
            };

            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            if !self.on_backoff_elapsed() {
                return;
            }
        }
    }

    fn on_backoff_elapsed(&self) -> bool {
        let mut shared = lock(&self.shared);
        if !shared.is_current(self.generation) {
            return false;
        }
        shared.set_state(ConnectionState::Connecting);
        true
    }

    fn on_open(&self, tx: mpsc::UnboundedSender<String>) -> bool {
        let mut shared = lock(&self.shared);
        if !shared.is_current(self.generation) {
            return false;
        }
        let reconnected = shared.attempt.count > 0;
        shared.attempt = ReconnectAttempt::reset(&self.policy);
        shared.outbound = Some(tx);
        shared.set_state(ConnectionState::Open);
        info!(url = %self.url, reconnected, "Chat socket open");
        true
    }

    fn dispatch(&self, event: WireEvent) -> bool {
        let shared = lock(&self.shared);
        if !shared.is_current(self.generation) {
            return false;
        }
        debug!(event_type = event.event_type(), "Inbound frame");
        for observer in &shared.observers {
            observer.on_event(&event);
        }
        true
    }

    fn report_unsent(&self, frames: &[String]) -> bool {
        let shared = lock(&self.shared);
        if !shared.is_current(self.generation) {
            return false;
        }
        warn!(url = %self.url, frames = frames.len(), "Outbound frames were not delivered");
        for observer in &shared.observers {
            observer.on_send_failed(frames);
        }
        true
    }

    /// Move to `Closed`, then either schedule a reconnect (returning its
    /// delay) or report exhaustion.
    fn on_closed(&self) -> Option<Duration> {
        let mut shared = lock(&self.shared);
        if !shared.is_current(self.generation) {
            return None;
        }
        shared.outbound = None;
        shared.set_state(ConnectionState::Closed);

        if !self.policy.should_retry(shared.attempt.count) {
            let attempts = shared.attempt.count;
            error!(url = %self.url, attempts, "Reconnect attempts exhausted");
            for observer in &shared.observers {
                observer.on_reconnect_exhausted(attempts);
            }
            return None;
        }

        let delay = shared.attempt.advance(&self.policy);
        shared.set_state(ConnectionState::Reconnecting);
        warn!(
            attempt = shared.attempt.count,
            max_attempts = self.policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );
        Some(delay)
    }
}

/// Observer forwarding everything into a channel; handy for consumers that
/// prefer a stream over callbacks.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ConnectionEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl ConnectionObserver for ChannelObserver {
    fn on_state_change(&self, state: ConnectionState) {
        let _ = self.tx.send(ConnectionEvent::StateChanged(state));
    }

    fn on_event(&self, event: &WireEvent) {
        let _ = self.tx.send(ConnectionEvent::Frame(event.clone()));
    }

    fn on_reconnect_exhausted(&self, attempts: u32) {
        let _ = self.tx.send(ConnectionEvent::ReconnectExhausted { attempts });
    }

    fn on_send_failed(&self, frames: &[String]) {
        let _ = self.tx.send(ConnectionEvent::SendFailed {
            frames: frames.to_vec(),
        });
    }
}
