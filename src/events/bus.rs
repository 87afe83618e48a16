//! Event bus for broadcasting chat updates to consumers

use super::{ChatUpdate, UpdateEmitter};
use tokio::sync::broadcast;
use tracing::debug;

/// Default broadcast channel capacity
const DEFAULT_CAPACITY: usize = 256;

/// Event bus that distributes ChatUpdates via `tokio::sync::broadcast`
///
/// Fire-and-forget: emitting never blocks, never panics.
/// If no subscribers are connected, updates are silently dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChatUpdate>,
    capacity: usize,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Publish an update subscribers can afford to miss.
    ///
    /// Skipped once half the channel is backlogged, so these alone never push
    /// a lagging subscriber past its capacity and evict updates sent through
    /// [`UpdateEmitter::emit`]. Returns whether the update was queued.
    pub fn emit_lossy(&self, update: ChatUpdate) -> bool {
        let backlog = self.sender.len();
        if backlog >= (self.capacity / 2).max(1) {
            debug!(
                update_type = update.update_type(),
                backlog, "Subscribers lagging, skipping update"
            );
            return false;
        }
        self.sender.send(update).is_ok()
    }

    /// Subscribe to receive updates
    pub fn subscribe(&self) -> broadcast::Receiver<ChatUpdate> {
        self.sender.subscribe()
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl UpdateEmitter for EventBus {
    fn emit(&self, update: ChatUpdate) {
        let kind = update.update_type();
        if let Ok(n) = self.sender.send(update) {
            debug!(update_type = kind, subscribers = n, "ChatUpdate emitted");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::types::Message;
    use crate::connection::ConnectionState;

    #[test]
    fn test_emit_without_subscriber_no_panic() {
        let bus = EventBus::default();
        bus.emit(ChatUpdate::Status {
            state: ConnectionState::Open,
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_emit_with_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(ChatUpdate::Message {
            message: Message::user("hello"),
        });

        match rx.try_recv().unwrap() {
            ChatUpdate::Message { message } => assert_eq!(message.text, "hello"),
            other => panic!("unexpected update: {:?}", other),
        }
    }

    #[test]
    fn test_multi_subscribers() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(ChatUpdate::ConversationChanged {
            conversation_id: "abc".into(),
        });

        for rx in [&mut rx1, &mut rx2] {
            assert_eq!(
                rx.try_recv().unwrap(),
                ChatUpdate::ConversationChanged {
                    conversation_id: "abc".into()
                }
            );
        }
    }

    #[test]
    fn test_dropped_subscriber_doesnt_affect_others() {
        let bus = EventBus::default();
        let rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        drop(rx1);
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(ChatUpdate::ReconnectExhausted { attempts: 10 });
        assert_eq!(
            rx2.try_recv().unwrap(),
            ChatUpdate::ReconnectExhausted { attempts: 10 }
        );
    }

    #[test]
    fn test_clone_shares_channel() {
        let bus = EventBus::default();
        let bus2 = bus.clone();
        let mut rx = bus.subscribe();

        bus2.emit(ChatUpdate::Status {
            state: ConnectionState::Closed,
        });
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_lossy_updates_leave_room_for_messages() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        let queued = (0..20)
            .filter(|_| {
                bus.emit_lossy(ChatUpdate::Status {
                    state: ConnectionState::Open,
                })
            })
            .count();
        assert_eq!(queued, 4);

        bus.emit(ChatUpdate::Message {
            message: Message::assistant("kept"),
        });
        let received: Vec<ChatUpdate> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(received.len(), 5);
        assert!(matches!(&received[4], ChatUpdate::Message { message } if message.text == "kept"));
    }

    #[test]
    fn test_lossy_update_without_subscriber() {
        let bus = EventBus::default();
        assert!(!bus.emit_lossy(ChatUpdate::Status {
            state: ConnectionState::Idle,
        }));
    }
}
