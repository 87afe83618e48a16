//! Connection state machine types

use crate::backoff::BackoffPolicy;
use crate::protocol::WireEvent;
use serde::Serialize;
use std::time::Duration;

/// Lifecycle state of the single chat socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
            ConnectionState::Reconnecting => "reconnecting",
        }
    }

    /// A transport is live or being established
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Reconnecting
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconnect bookkeeping, reset on every successful open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectAttempt {
    pub count: u32,
    pub next_delay: Duration,
}

impl ReconnectAttempt {
    pub fn reset(policy: &BackoffPolicy) -> Self {
        Self {
            count: 0,
            next_delay: policy.delay(1),
        }
    }

    /// Record one more attempt and return the delay to wait before it
    pub fn advance(&mut self, policy: &BackoffPolicy) -> Duration {
        self.count += 1;
        let delay = policy.delay(self.count);
        self.next_delay = policy.delay(self.count + 1);
        delay
    }
}

/// Everything the connection manager reports to observers
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    StateChanged(ConnectionState),
    Frame(WireEvent),
    /// Automatic reconnection gave up; a manual `connect()` is required
    ReconnectExhausted { attempts: u32 },
    /// Frames queued for an epoch that ended before they were written
    SendFailed { frames: Vec<String> },
}
