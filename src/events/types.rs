//! Update types delivered to chat consumers

use crate::chat::types::{Message, TurnProgress};
use crate::connection::ConnectionState;
use serde::Serialize;

/// What a consumer (UI) hears from the chat client
///
/// Must be Clone for `tokio::sync::broadcast`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatUpdate {
    /// A finalized message, user or assistant
    Message { message: Message },
    /// What changed on the turn still streaming (live typing preview).
    /// Best-effort: skipped while subscribers lag, `pending_turn()` has the
    /// full snapshot.
    TurnUpdated { progress: TurnProgress },
    /// Connection status changed
    Status { state: ConnectionState },
    /// The server assigned a conversation id
    ConversationChanged { conversation_id: String },
    /// Automatic reconnection gave up; the user should retry or reload
    ReconnectExhausted { attempts: u32 },
}

impl ChatUpdate {
    /// Get the update type name (used for logging)
    pub fn update_type(&self) -> &'static str {
        match self {
            ChatUpdate::Message { .. } => "message",
            ChatUpdate::TurnUpdated { .. } => "turn_updated",
            ChatUpdate::Status { .. } => "status",
            ChatUpdate::ConversationChanged { .. } => "conversation_changed",
            ChatUpdate::ReconnectExhausted { .. } => "reconnect_exhausted",
        }
    }
}

/// Trait for anything that can publish chat updates
pub trait UpdateEmitter: Send + Sync {
    fn emit(&self, update: ChatUpdate);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_serializes_with_tag() {
        let update = ChatUpdate::Status {
            state: ConnectionState::Reconnecting,
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["type"], "status");
        assert_eq!(value["state"], "reconnecting");
        assert_eq!(update.update_type(), "status");
    }

    #[test]
    fn test_message_update_carries_message() {
        let update = ChatUpdate::Message {
            message: Message::user("hi"),
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["message"]["text"], "hi");
    }
}
