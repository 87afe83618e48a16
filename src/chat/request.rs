//! Outbound request builder

use super::types::Message;
use crate::error::{ChatError, Result};
use crate::protocol::{OutboundMessage, OutboundRequest, Role};

/// Build the outbound frame for a new user message.
///
/// `history` is mapped in order and `new_text` is appended last as a user
/// entry. An empty credential is a build failure, no request is produced.
pub fn build_request(
    history: &[Message],
    new_text: &str,
    credential: &str,
    conversation_id: Option<&str>,
) -> Result<OutboundRequest> {
    if credential.trim().is_empty() {
        return Err(ChatError::MissingCredential);
    }

    let messages = history
        .iter()
        .map(|m| OutboundMessage {
            role: m.sender.into(),
            content: m.text.clone(),
        })
        .chain(std::iter::once(OutboundMessage {
            role: Role::User,
            content: new_text.to_string(),
        }))
        .collect();

    Ok(OutboundRequest {
        token: credential.to_string(),
        conversation_id: conversation_id.map(str::to_string),
        messages,
    })
}
