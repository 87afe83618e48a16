//! Error type shared by the chat stream client

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T, E = ChatError> = std::result::Result<T, E>;

/// Errors surfaced by the chat stream client.
///
/// Transport failures never reach callers directly: the connection manager
/// recovers them locally and only reports reconnect exhaustion.
#[derive(Debug, Error)]
pub enum ChatError {
    /// No credential was available when building an outbound request
    #[error("no credential available for outbound request")]
    MissingCredential,

    /// The transport is not open
    #[error("connection is not open")]
    NotOpen,

    /// The client was torn down and can no longer be used
    #[error("client has been torn down")]
    TornDown,

    /// Serializing an outbound frame failed
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    /// The underlying socket failed to open or write
    #[error("transport error: {0}")]
    Transport(String),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ChatError {
    /// Build a transport error from anything printable
    pub fn transport(err: impl std::fmt::Display) -> Self {
        ChatError::Transport(err.to_string())
    }
}
