//! Chat types — turns under construction and finalized messages

use crate::protocol::{ComponentPayload, Role};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Locally generated, process-wide monotonic identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    pub fn next() -> Self {
        MessageId(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl From<Sender> for Role {
    fn from(sender: Sender) -> Self {
        match sender {
            Sender::User => Role::User,
            Sender::Assistant => Role::Assistant,
        }
    }
}

/// A UI component the server asked the consumer to render
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachedComponent {
    pub name: String,
    /// Raw arguments as received
    pub args: serde_json::Value,
}

impl From<ComponentPayload> for AttachedComponent {
    fn from(payload: ComponentPayload) -> Self {
        Self {
            name: payload.component,
            args: payload.args,
        }
    }
}

/// One server response cycle while it is still streaming
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub id: MessageId,
    /// Append-only
    pub text: String,
    pub attached_component: Option<AttachedComponent>,
    pub is_open: bool,
    pub started_at: DateTime<Utc>,
}

impl Turn {
    pub fn new() -> Self {
        Self {
            id: MessageId::next(),
            text: String::new(),
            attached_component: None,
            is_open: true,
            started_at: Utc::now(),
        }
    }

    pub fn with_text(text: &str) -> Self {
        let mut turn = Self::new();
        turn.text.push_str(text);
        turn
    }

    pub fn with_component(component: AttachedComponent) -> Self {
        let mut turn = Self::new();
        turn.attached_component = Some(component);
        turn
    }

    pub fn append(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Freeze into an assistant message, keeping the turn's id
    pub fn finalize(mut self) -> Message {
        self.is_open = false;
        Message {
            id: self.id,
            sender: Sender::Assistant,
            text: self.text,
            attached_component: self.attached_component,
            created_at: Utc::now(),
        }
    }
}

impl Default for Turn {
    fn default() -> Self {
        Self::new()
    }
}

/// Incremental change to the open turn, for live previews
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnProgress {
    pub turn_id: MessageId,
    /// Text appended by this event; empty when only a component arrived
    pub appended: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attached_component: Option<AttachedComponent>,
}

/// A finalized, immutable chat message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attached_component: Option<AttachedComponent>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Locally originated user input (never streamed)
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    /// Assistant message synthesized locally (e.g. the offline fallback)
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text)
    }

    fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: MessageId::next(),
            sender,
            text: text.into(),
            attached_component: None,
            created_at: Utc::now(),
        }
    }
}
