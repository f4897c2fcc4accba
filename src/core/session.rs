use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::core::events::{ChatEvent, EventBus};
use crate::core::ids;
use crate::core::message::{now_millis, Message, Timestamp};

/// Title every session carries until its first user message names it.
pub const DEFAULT_TITLE: &str = "New Chat";
pub const TITLE_MAX_GRAPHEMES: usize = 30;
const TITLE_ELLIPSIS: &str = "...";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub updated_at: Timestamp,
}

impl ChatSession {
    pub fn new(id: String, updated_at: Timestamp) -> Self {
        Self {
            id,
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            updated_at,
        }
    }

    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }

    fn derive_title_if_needed(&mut self) {
        if !self.has_default_title() {
            return;
        }
        let Some(first) = self.messages.first() else {
            return;
        };
        if !first.is_user() {
            return;
        }
        if let Some(title) = derive_title(&first.content) {
            self.title = title;
        }
    }
}

/// Builds a title from the opening user message: the first
/// [`TITLE_MAX_GRAPHEMES`] grapheme clusters, with an ellipsis when cut.
/// Returns `None` for empty content so the default title stays in place.
pub fn derive_title(content: &str) -> Option<String> {
    if content.is_empty() {
        return None;
    }
    let mut graphemes = content.graphemes(true);
    let head: String = graphemes.by_ref().take(TITLE_MAX_GRAPHEMES).collect();
    if graphemes.next().is_some() {
        Some(format!("{head}{TITLE_ELLIPSIS}"))
    } else {
        Some(head)
    }
}

/// In-memory collection of chat sessions.
///
/// Sessions are kept with the most recently touched first so that equal
/// `updated_at` values still list deterministically.
pub struct SessionStore {
    sessions: Vec<ChatSession>,
    events: EventBus,
    clock: fn() -> Timestamp,
}

impl SessionStore {
    pub fn new(events: EventBus) -> Self {
        Self::from_sessions(Vec::new(), events)
    }

    pub fn from_sessions(sessions: Vec<ChatSession>, events: EventBus) -> Self {
        Self {
            sessions,
            events,
            clock: now_millis,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> Timestamp) -> Self {
        self.clock = clock;
        self
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.position(session_id).is_some()
    }

    pub fn get(&self, session_id: &str) -> Option<&ChatSession> {
        self.sessions
            .iter()
            .find(|session| session.id == session_id)
    }

    pub fn create_session(&mut self) -> String {
        let mut id = ids::generate();
        while self.contains(&id) {
            id = ids::generate();
        }
        let session = ChatSession::new(id.clone(), (self.clock)());
        self.sessions.insert(0, session);
        self.events.emit(ChatEvent::SessionCreated {
            session_id: id.clone(),
        });
        id
    }

    /// Appends to the named session. An unknown id is a silent no-op and
    /// returns false.
    pub fn append_message(&mut self, session_id: &str, message: Message) -> bool {
        let Some(index) = self.position(session_id) else {
            tracing::debug!("append to missing session {session_id} ignored");
            return false;
        };
        let now = (self.clock)();
        let message_id = message.id.clone();
        let session = self.touch(index);
        session.messages.push(message);
        session.updated_at = session.updated_at.max(now);
        session.derive_title_if_needed();

        self.events.emit(ChatEvent::MessageAppended {
            session_id: session_id.to_string(),
            message_id,
        });
        self.events.emit(ChatEvent::SessionUpdated {
            session_id: session_id.to_string(),
        });
        true
    }

    pub fn message_mut(&mut self, session_id: &str, message_id: &str) -> Option<&mut Message> {
        self.sessions
            .iter_mut()
            .find(|session| session.id == session_id)?
            .messages
            .iter_mut()
            .find(|message| message.id == message_id)
    }

    /// Marks an in-place change to a session's messages as committed.
    pub fn commit(&mut self, session_id: &str) -> bool {
        let Some(index) = self.position(session_id) else {
            return false;
        };
        let now = (self.clock)();
        let session = self.touch(index);
        session.updated_at = session.updated_at.max(now);
        self.events.emit(ChatEvent::SessionUpdated {
            session_id: session_id.to_string(),
        });
        true
    }

    pub fn delete_session(&mut self, session_id: &str) -> bool {
        let Some(index) = self.position(session_id) else {
            return false;
        };
        self.sessions.remove(index);
        self.events.emit(ChatEvent::SessionDeleted {
            session_id: session_id.to_string(),
        });
        true
    }

    /// All sessions, most recently updated first. Sorted on every call.
    pub fn list_sessions(&self) -> Vec<&ChatSession> {
        let mut listed: Vec<&ChatSession> = self.sessions.iter().collect();
        listed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        listed
    }

    fn position(&self, session_id: &str) -> Option<usize> {
        self.sessions
            .iter()
            .position(|session| session.id == session_id)
    }

    fn touch(&mut self, index: usize) -> &mut ChatSession {
        if index != 0 {
            let session = self.sessions.remove(index);
            self.sessions.insert(0, session);
        }
        &mut self.sessions[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Role;

    fn frozen_clock() -> Timestamp {
        1_000
    }

    fn store() -> SessionStore {
        SessionStore::new(EventBus::new())
    }

    #[test]
    fn long_first_message_is_truncated_with_ellipsis() {
        let mut store = store();
        let id = store.create_session();
        let content = "Explain quantum computing in simple terms for a curious beginner";
        store.append_message(&id, Message::user(content, None));
        let session = store.get(&id).expect("session");
        assert_eq!(session.title, "Explain quantum computing in s...");
        assert_eq!(session.title, format!("{}...", &content[..30]));
    }

    #[test]
    fn short_first_message_becomes_title_verbatim() {
        let mut store = store();
        let id = store.create_session();
        let exact = "abcdefghijklmnopqrstuvwxyz0123";
        assert_eq!(exact.len(), 30);
        store.append_message(&id, Message::user(exact, None));
        assert_eq!(store.get(&id).expect("session").title, exact);
    }

    #[test]
    fn title_is_derived_only_once() {
        let mut store = store();
        let id = store.create_session();
        store.append_message(&id, Message::user("First question", None));
        store.append_message(&id, Message::model("Answer"));
        store.append_message(&id, Message::user("Another question entirely", None));
        assert_eq!(store.get(&id).expect("session").title, "First question");
    }

    #[test]
    fn model_first_message_keeps_default_title() {
        let mut store = store();
        let id = store.create_session();
        store.append_message(&id, Message::new(Role::Model, "Welcome"));
        assert!(store.get(&id).expect("session").has_default_title());
    }

    #[test]
    fn title_truncation_respects_grapheme_clusters() {
        let content = "😭".repeat(31);
        let title = derive_title(&content).expect("title");
        assert_eq!(title, format!("{}...", "😭".repeat(30)));
        assert_eq!(derive_title(""), None);
    }

    #[test]
    fn append_to_unknown_session_is_ignored() {
        let mut store = store();
        assert!(!store.append_message("missing", Message::user("hi", None)));
        assert!(store.is_empty());
    }

    #[test]
    fn appended_session_lists_first() {
        let mut store = store();
        let first = store.create_session();
        let second = store.create_session();
        store.append_message(&second, Message::user("second", None));
        store.append_message(&first, Message::user("first", None));
        let listed: Vec<&str> = store
            .list_sessions()
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(listed, vec![first.as_str(), second.as_str()]);
    }

    #[test]
    fn ties_on_updated_at_list_most_recently_touched_first() {
        let mut store = SessionStore::new(EventBus::new()).with_clock(frozen_clock);
        let a = store.create_session();
        let b = store.create_session();
        let c = store.create_session();
        store.append_message(&a, Message::user("a", None));
        let listed: Vec<&str> = store
            .list_sessions()
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(listed, vec![a.as_str(), c.as_str(), b.as_str()]);
    }

    #[test]
    fn updated_at_never_moves_backwards() {
        let mut store = SessionStore::new(EventBus::new()).with_clock(frozen_clock);
        let id = store.create_session();
        let mut session = store.get(&id).expect("session").clone();
        session.updated_at = 5_000;
        let mut store = SessionStore::from_sessions(vec![session], EventBus::new())
            .with_clock(frozen_clock);
        store.append_message(&id, Message::user("hi", None));
        assert_eq!(store.get(&id).expect("session").updated_at, 5_000);
    }

    #[test]
    fn delete_removes_only_the_named_session() {
        let mut store = store();
        let keep = store.create_session();
        let doomed = store.create_session();
        assert!(store.delete_session(&doomed));
        assert!(!store.delete_session(&doomed));
        assert!(store.contains(&keep));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn mutations_emit_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let mut store = SessionStore::new(bus);
        let id = store.create_session();
        let message = Message::user("hello", None);
        let message_id = message.id.clone();
        store.append_message(&id, message);
        store.delete_session(&id);

        let events: Vec<ChatEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(
            events,
            vec![
                ChatEvent::SessionCreated {
                    session_id: id.clone()
                },
                ChatEvent::MessageAppended {
                    session_id: id.clone(),
                    message_id,
                },
                ChatEvent::SessionUpdated {
                    session_id: id.clone()
                },
                ChatEvent::SessionDeleted { session_id: id },
            ]
        );
    }

    #[test]
    fn persisted_shape_matches_document_format() {
        let mut session = ChatSession::new("s1".into(), 7);
        session.title = "Hello".into();
        let json = serde_json::to_value(&session).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"id": "s1", "title": "Hello", "messages": [], "updatedAt": 7})
        );
    }
}
