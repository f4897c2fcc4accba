use tokio::sync::broadcast;

use crate::core::reconciler::TurnOutcome;

const EVENT_CAPACITY: usize = 256;

/// State changes published to whatever renders the conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    SessionCreated {
        session_id: String,
    },
    SessionUpdated {
        session_id: String,
    },
    SessionDeleted {
        session_id: String,
    },
    ActiveSessionChanged {
        session_id: Option<String>,
    },
    MessageAppended {
        session_id: String,
        message_id: String,
    },
    FragmentApplied {
        session_id: String,
        message_id: String,
        fragment: String,
    },
    TurnFinished {
        session_id: String,
        message_id: String,
        outcome: TurnOutcome,
    },
    SettingsChanged,
}

/// Fan-out of [`ChatEvent`]s. Subscribers that fall more than
/// `EVENT_CAPACITY` events behind observe a lag error and skip ahead.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ChatEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ChatEvent) {
        // No subscribers is a normal state for headless commands.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.emit(ChatEvent::SettingsChanged);
    }

    #[test]
    fn subscribers_receive_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(ChatEvent::SessionCreated {
            session_id: "a".into(),
        });
        bus.emit(ChatEvent::SettingsChanged);
        assert_eq!(
            rx.try_recv().expect("first"),
            ChatEvent::SessionCreated {
                session_id: "a".into()
            }
        );
        assert_eq!(rx.try_recv().expect("second"), ChatEvent::SettingsChanged);
        assert!(rx.try_recv().is_err());
    }
}
