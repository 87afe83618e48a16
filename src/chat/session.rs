//! SessionRegistry — the active conversation id
//!
//! The id is replaced wholesale when the server announces a conversation and
//! survives reconnects. There is no other way to change it.

use tracing::info;

#[derive(Debug, Default, Clone)]
pub struct SessionRegistry {
    active_conversation_id: Option<String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_conversation_id(&self) -> Option<&str> {
        self.active_conversation_id.as_deref()
    }

    /// Record a server-assigned conversation id.
    ///
    /// Returns true when the active id changed.
    pub fn on_conversation_created(&mut self, conversation_id: impl Into<String>) -> bool {
        let conversation_id = conversation_id.into();
        if self.active_conversation_id.as_deref() == Some(conversation_id.as_str()) {
            return false;
        }
        info!(
            conversation_id = %conversation_id,
            previous = ?self.active_conversation_id,
            "Active conversation changed"
        );
        self.active_conversation_id = Some(conversation_id);
        true
    }
}
