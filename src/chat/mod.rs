//! Chat module — turn accumulation, session tracking and the consumer-facing client
//!
//! Frames arriving from the connection layer are folded into assistant turns,
//! the server-assigned conversation id is remembered across reconnects, and
//! everything the UI needs is published through [`ChatClient`].

pub mod accumulator;
pub mod client;
pub mod config;
pub mod request;
pub mod session;
pub mod types;

pub use accumulator::{Applied, TurnAccumulator};
pub use client::{ChatClient, SendOutcome};
pub use config::ChatConfig;
pub use request::build_request;
pub use session::SessionRegistry;
pub use types::{AttachedComponent, Message, MessageId, Sender, Turn, TurnProgress};
