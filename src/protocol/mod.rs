//! Wire protocol for the chat stream socket
//!
//! Inbound frames are a tagged union keyed by `type`/`Type` with an optional
//! `payload`/`Payload`. Everything downstream of [`codec::decode`] works with
//! typed [`WireEvent`]s and never looks at raw JSON again.

pub mod codec;
pub mod types;

pub use codec::{decode, encode};
pub use types::{ComponentPayload, OutboundMessage, OutboundRequest, Role, WireEvent};
