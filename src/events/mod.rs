//! Consumer-facing update stream
//!
//! This module provides:
//! - `ChatUpdate` — typed updates for the UI (messages, status, conversation)
//! - `EventBus` — broadcast channel distributing updates to subscribers

mod bus;
mod types;

pub use bus::EventBus;
pub use types::{ChatUpdate, UpdateEmitter};
