//! Headless session commands: list, show, delete.

use crate::core::events::EventBus;
use crate::core::persistence::LocalStore;
use crate::core::session::{ChatSession, SessionStore};
use crate::ui::render;

/// Finds a session by its 1-based position in `sessions` or by id.
pub fn resolve_session<'a>(
    sessions: &[&'a ChatSession],
    reference: &str,
) -> Option<&'a ChatSession> {
    let reference = reference.trim();
    if let Ok(number) = reference.parse::<usize>() {
        if let Some(session) = number.checked_sub(1).and_then(|i| sessions.get(i).copied()) {
            return Some(session);
        }
    }
    sessions
        .iter()
        .copied()
        .find(|session| session.id == reference)
}

pub fn not_found(reference: &str) -> String {
    format!("❌ No session matches '{reference}'. Run 'parley sessions' to list them.")
}

pub fn list_sessions(local: &LocalStore) -> String {
    let state = local.load();
    let store = SessionStore::from_sessions(state.sessions, EventBus::new());
    let mut out = render::session_list(&store.list_sessions(), None, &state.settings);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

pub fn show_session(local: &LocalStore, reference: &str) -> Option<String> {
    let state = local.load();
    let store = SessionStore::from_sessions(state.sessions, EventBus::new());
    let sessions = store.list_sessions();
    resolve_session(&sessions, reference)
        .map(|session| render::transcript(session, &state.settings))
}

/// Deletes the referenced session and rewrites the history. Returns the
/// deleted session's title.
pub fn delete_session(
    local: &LocalStore,
    reference: &str,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let state = local.load();
    let mut store = SessionStore::from_sessions(state.sessions, EventBus::new());
    let Some((id, title)) = resolve_session(&store.list_sessions(), reference)
        .map(|session| (session.id.clone(), session.title.clone()))
    else {
        return Ok(None);
    };
    store.delete_session(&id);
    local.save_sessions(store.list_sessions())?;
    Ok(Some(title))
}
