//! Wire types — inbound events and the outbound request frame

use serde::{Deserialize, Serialize};

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    /// The server assigned a (new) conversation id
    ConversationCreated { conversation_id: String },
    /// A UI-renderable artifact is starting for the current turn
    Component(ComponentPayload),
    /// Incremental plain-text fragment of the current turn (may be empty)
    Token { text: String },
    /// Terminates the current turn
    Done,
}

impl WireEvent {
    /// Discriminant name as the server spells it
    pub fn event_type(&self) -> &'static str {
        match self {
            WireEvent::ConversationCreated { .. } => "ConversationCreated",
            WireEvent::Component(_) => "Component",
            WireEvent::Token { .. } => "Token",
            WireEvent::Done => "Done",
        }
    }
}

/// Payload of a `Component` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentPayload {
    /// Component name, e.g. `"SalesChart"`
    pub component: String,
    /// Raw arguments, passed through untouched to the renderer
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Author of an outbound history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One history entry inside an outbound request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub role: Role,
    pub content: String,
}

/// The single outbound frame shape
///
/// `conversationId` is serialized as `null` for a conversation the server has
/// not named yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundRequest {
    pub token: String,
    pub conversation_id: Option<String>,
    pub messages: Vec<OutboundMessage>,
}
