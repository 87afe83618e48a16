//! TurnAccumulator — folds streamed events into assistant messages
//!
//! At most one turn is open at a time. `Token` and `Component` open a turn
//! implicitly, `Done` finalizes it. A turn carries at most one component, so
//! a second `Component` before `Done` finalizes the current turn and starts
//! a new one. Connection churn does not touch the open turn: it keeps
//! accumulating once frames flow again.

use super::types::{AttachedComponent, Message, Turn, TurnProgress};
use crate::protocol::WireEvent;
use tracing::debug;

/// Result of folding one event
#[derive(Debug, Default, PartialEq)]
pub struct Applied {
    /// Message completed by this event
    pub finalized: Option<Message>,
    /// Change to the turn left open after this event
    pub progress: Option<TurnProgress>,
}

#[derive(Debug, Default)]
pub struct TurnAccumulator {
    open: Option<Turn>,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The turn currently being streamed, if any
    pub fn open_turn(&self) -> Option<&Turn> {
        self.open.as_ref()
    }

    pub fn has_open_turn(&self) -> bool {
        self.open.is_some()
    }

    /// Fold one event. Returns the message finalized by it, if any.
    ///
    /// `ConversationCreated` is not a turn event and is ignored here.
    pub fn apply(&mut self, event: &WireEvent) -> Option<Message> {
        self.step(event).finalized
    }

    /// Fold one event and report both the finalized message and what changed
    /// on the open turn. `progress` is `None` when the event left the open
    /// turn untouched.
    pub fn step(&mut self, event: &WireEvent) -> Applied {
        match event {
            WireEvent::Token { text } => {
                if text.is_empty() {
                    return Applied::default();
                }
                let turn_id = match self.open.as_mut() {
                    Some(turn) => {
                        turn.append(text);
                        turn.id
                    }
                    None => {
                        let turn = Turn::with_text(text);
                        debug!(turn_id = %turn.id, "Turn opened by token");
                        let id = turn.id;
                        self.open = Some(turn);
                        id
                    }
                };
                Applied {
                    finalized: None,
                    progress: Some(TurnProgress {
                        turn_id,
                        appended: text.clone(),
                        attached_component: None,
                    }),
                }
            }
            WireEvent::Component(payload) => {
                let component: AttachedComponent = payload.clone().into();
                let progress = |turn: &Turn| TurnProgress {
                    turn_id: turn.id,
                    appended: String::new(),
                    attached_component: turn.attached_component.clone(),
                };
                match self.open.as_mut() {
                    Some(turn) if turn.attached_component.is_none() => {
                        turn.attached_component = Some(component);
                        Applied {
                            finalized: None,
                            progress: Some(progress(turn)),
                        }
                    }
                    _ => {
                        let finished = self.open.take().map(Turn::finalize);
                        let turn = Turn::with_component(component);
                        debug!(
                            turn_id = %turn.id,
                            component = %payload.component,
                            "Turn opened by component"
                        );
                        let turn = self.open.insert(turn);
                        Applied {
                            finalized: finished,
                            progress: Some(progress(turn)),
                        }
                    }
                }
            }
            WireEvent::Done => {
                let message = self.open.take().map(Turn::finalize);
                if message.is_none() {
                    debug!("Done without an open turn, ignoring");
                }
                Applied {
                    finalized: message,
                    progress: None,
                }
            }
            WireEvent::ConversationCreated { .. } => Applied::default(),
        }
    }
}
