//! The chat controller: owns the session store, one backend conversation per
//! session, and the turn lifecycle that ties them together.
//!
//! Nothing here renders. Frontends call the operations below and either poll
//! the accessors or subscribe to [`ChatEvent`]s.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::core::backend::{ChatBackend, Conversation, FragmentStream, StreamMessage};
use crate::core::events::{ChatEvent, EventBus};
use crate::core::message::{Attachment, Message};
use crate::core::persistence::{LoadedState, LocalStore};
use crate::core::reconciler::{Reconciled, StreamingReconciler, TurnOutcome, CANCELLED_REPLY};
use crate::core::session::{ChatSession, SessionStore};
use crate::core::settings::AppSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// No text and no attachment.
    Empty,
    /// The session already has a turn in flight.
    Busy { session_id: String },
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Empty => write!(f, "Nothing to send"),
            SubmitError::Busy { .. } => {
                write!(f, "Still waiting for the previous reply; stop it or wait")
            }
        }
    }
}

impl Error for SubmitError {}

/// A turn that has been started but not yet driven to completion.
pub struct PendingTurn {
    pub session_id: String,
    pub stream_id: u64,
    pub placeholder_id: String,
    fragments: FragmentStream,
}

impl PendingTurn {
    /// Cancelling this token stops the turn, keeping any partial reply.
    pub fn cancel_token(&self) -> CancellationToken {
        self.fragments.cancel_token()
    }
}

struct SessionRuntime {
    conversation: Conversation,
    reconciler: StreamingReconciler,
    /// User message of the turn in flight, recorded into the conversation
    /// once the reply settles.
    pending_user: Option<Message>,
}

impl SessionRuntime {
    fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            reconciler: StreamingReconciler::new(),
            pending_user: None,
        }
    }
}

pub struct ChatController<B: ChatBackend> {
    backend: B,
    store: SessionStore,
    settings: AppSettings,
    local: LocalStore,
    events: EventBus,
    active: Option<String>,
    /// Conversation for the not-yet-created session behind "new chat".
    draft: Option<Conversation>,
    runtimes: HashMap<String, SessionRuntime>,
    pending_attachment: Option<Attachment>,
    turn_timeout: Duration,
}

impl<B: ChatBackend> ChatController<B> {
    /// Loads persisted state from `local` and starts on a fresh chat.
    pub fn new(backend: B, local: LocalStore, turn_timeout: Duration) -> Self {
        let events = EventBus::new();
        let LoadedState { settings, sessions } = local.load();
        tracing::debug!(
            "loaded {} sessions from {}",
            sessions.len(),
            local.dir().display()
        );
        let store = SessionStore::from_sessions(sessions, events.clone());
        Self {
            backend,
            store,
            settings,
            local,
            events,
            active: None,
            draft: None,
            runtimes: HashMap::new(),
            pending_attachment: None,
            turn_timeout,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Applies `update` and persists the result if anything changed.
    pub fn update_settings(&mut self, update: impl FnOnce(&mut AppSettings)) {
        let before = self.settings.clone();
        update(&mut self.settings);
        if self.settings == before {
            return;
        }
        if let Err(err) = self.local.save_settings(&self.settings) {
            tracing::warn!("failed to save settings: {err}");
        }
        self.events.emit(ChatEvent::SettingsChanged);
    }

    /// Sessions, most recently updated first.
    pub fn sessions(&self) -> Vec<&ChatSession> {
        self.store.list_sessions()
    }

    pub fn session(&self, session_id: &str) -> Option<&ChatSession> {
        self.store.get(session_id)
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_session(&self) -> Option<&ChatSession> {
        self.active.as_deref().and_then(|id| self.store.get(id))
    }

    pub fn active_messages(&self) -> &[Message] {
        self.active_session()
            .map(|session| session.messages.as_slice())
            .unwrap_or(&[])
    }

    pub fn pending_attachment(&self) -> Option<&Attachment> {
        self.pending_attachment.as_ref()
    }

    pub fn set_attachment(&mut self, attachment: Attachment) {
        self.pending_attachment = Some(attachment);
    }

    pub fn clear_attachment(&mut self) -> Option<Attachment> {
        self.pending_attachment.take()
    }

    pub fn is_generating(&self, session_id: &str) -> bool {
        self.runtimes
            .get(session_id)
            .is_some_and(|runtime| runtime.reconciler.is_generating())
    }

    /// Leaves the active session. The new session is only created when its
    /// first message is sent.
    pub fn new_chat(&mut self) {
        self.active = None;
        self.pending_attachment = None;
        self.draft = Some(self.backend.start_conversation(&[]));
        self.events
            .emit(ChatEvent::ActiveSessionChanged { session_id: None });
    }

    pub fn select_chat(&mut self, session_id: &str) -> bool {
        let Some(session) = self.store.get(session_id) else {
            tracing::debug!("select of unknown session {session_id} ignored");
            return false;
        };
        if !self.runtimes.contains_key(session_id) {
            let conversation = self.backend.start_conversation(&session.messages);
            self.runtimes
                .insert(session_id.to_string(), SessionRuntime::new(conversation));
        }
        self.active = Some(session_id.to_string());
        self.pending_attachment = None;
        self.events.emit(ChatEvent::ActiveSessionChanged {
            session_id: Some(session_id.to_string()),
        });
        true
    }

    /// Removes a session and everything attached to it. Deleting the active
    /// session falls back to a fresh chat.
    pub fn delete_chat(&mut self, session_id: &str) -> bool {
        if let Some(mut runtime) = self.runtimes.remove(session_id) {
            runtime.reconciler.abandon();
        }
        if !self.store.delete_session(session_id) {
            return false;
        }
        if self.active.as_deref() == Some(session_id) {
            self.new_chat();
        }
        self.persist_sessions();
        true
    }

    /// Starts a turn in the active session, creating it if needed.
    ///
    /// The user message and an empty streaming placeholder are appended
    /// before the backend is asked for anything. Drive the returned turn
    /// with [`ChatController::drive_turn`] or feed its messages through
    /// [`ChatController::apply_stream_message`].
    pub fn submit(&mut self, text: &str) -> Result<PendingTurn, SubmitError> {
        let text = text.trim();
        if text.is_empty() && self.pending_attachment.is_none() {
            return Err(SubmitError::Empty);
        }

        let session_id = match self.active.clone() {
            Some(id) if self.store.contains(&id) => {
                self.expire_overdue(&id, Instant::now());
                if self.is_generating(&id) {
                    return Err(SubmitError::Busy { session_id: id });
                }
                id
            }
            _ => self.open_draft(),
        };
        if !self.runtimes.contains_key(&session_id) {
            let messages = self
                .store
                .get(&session_id)
                .map(|session| session.messages.as_slice())
                .unwrap_or(&[]);
            let conversation = self.backend.start_conversation(messages);
            self.runtimes
                .insert(session_id.clone(), SessionRuntime::new(conversation));
        }

        let user = Message::user(text, self.pending_attachment.take());
        let placeholder = Message::placeholder();
        let placeholder_id = placeholder.id.clone();
        self.store.append_message(&session_id, user.clone());
        self.store.append_message(&session_id, placeholder);

        let Some(runtime) = self.runtimes.get_mut(&session_id) else {
            return Err(SubmitError::Busy { session_id });
        };
        let fragments = self.backend.send_turn(
            &runtime.conversation,
            &user.content,
            user.attachment.as_ref(),
        );
        let Some(stream_id) = runtime.reconciler.begin(
            placeholder_id.clone(),
            fragments.cancel_token(),
            self.turn_timeout,
        ) else {
            return Err(SubmitError::Busy { session_id });
        };
        runtime.pending_user = Some(user);
        self.persist_sessions();

        Ok(PendingTurn {
            session_id,
            stream_id,
            placeholder_id,
            fragments,
        })
    }

    /// Folds one stream message into its session. Messages for a stale
    /// stream or a deleted session are ignored. Returns the outcome once the
    /// turn settles.
    pub fn apply_stream_message(
        &mut self,
        session_id: &str,
        stream_id: u64,
        message: StreamMessage,
    ) -> Option<TurnOutcome> {
        let runtime = self.runtimes.get_mut(session_id)?;
        if !runtime.reconciler.is_current_stream(stream_id) {
            tracing::debug!("dropping message for stale stream {stream_id}");
            return None;
        }
        let placeholder_id = runtime.reconciler.placeholder_id()?.to_string();
        let Some(placeholder) = self.store.message_mut(session_id, &placeholder_id) else {
            runtime.reconciler.abandon();
            return Some(TurnOutcome::Cancelled);
        };

        let fragment = match &message {
            StreamMessage::Chunk(text) => Some(text.clone()),
            _ => None,
        };
        match runtime.reconciler.apply(stream_id, message, placeholder) {
            Reconciled::Ignored => None,
            Reconciled::Appended => {
                if let Some(fragment) = fragment {
                    self.events.emit(ChatEvent::FragmentApplied {
                        session_id: session_id.to_string(),
                        message_id: placeholder_id,
                        fragment,
                    });
                }
                None
            }
            Reconciled::Finished(outcome) => {
                self.finish_turn(session_id, &placeholder_id, outcome);
                Some(outcome)
            }
        }
    }

    /// Stops the session's turn, keeping whatever arrived so far.
    pub fn stop_generation(&mut self, session_id: &str) -> Option<TurnOutcome> {
        let runtime = self.runtimes.get_mut(session_id)?;
        let placeholder_id = runtime.reconciler.placeholder_id()?.to_string();
        let placeholder = self.store.message_mut(session_id, &placeholder_id)?;
        let outcome = runtime.reconciler.cancel(placeholder)?;
        self.finish_turn(session_id, &placeholder_id, outcome);
        Some(outcome)
    }

    /// Fails the session's turn if it has outlived the turn timeout.
    pub fn expire_overdue(&mut self, session_id: &str, now: Instant) -> Option<TurnOutcome> {
        let runtime = self.runtimes.get_mut(session_id)?;
        if !runtime.reconciler.is_overdue(now) {
            return None;
        }
        self.time_out(session_id)
    }

    /// Pulls fragments until the turn settles, is cancelled, or runs out of
    /// time.
    pub async fn drive_turn(&mut self, mut turn: PendingTurn) -> TurnOutcome {
        let deadline = tokio::time::Instant::now() + self.turn_timeout;
        loop {
            if !self.is_turn_current(&turn) {
                return self.settled_outcome(&turn.session_id);
            }
            match tokio::time::timeout_at(deadline, turn.fragments.next()).await {
                Ok(Some(message)) => {
                    if let Some(outcome) =
                        self.apply_stream_message(&turn.session_id, turn.stream_id, message)
                    {
                        return outcome;
                    }
                }
                Ok(None) if turn.fragments.is_cancelled() => {
                    return self
                        .stop_generation(&turn.session_id)
                        .unwrap_or_else(|| self.settled_outcome(&turn.session_id));
                }
                Ok(None) => {
                    tracing::debug!("reply stream {} closed without end", turn.stream_id);
                    return self
                        .apply_stream_message(&turn.session_id, turn.stream_id, StreamMessage::End)
                        .unwrap_or_else(|| self.settled_outcome(&turn.session_id));
                }
                Err(_) => {
                    tracing::warn!("reply in session {} timed out", turn.session_id);
                    return self
                        .time_out(&turn.session_id)
                        .unwrap_or_else(|| self.settled_outcome(&turn.session_id));
                }
            }
        }
    }

    fn is_turn_current(&self, turn: &PendingTurn) -> bool {
        self.runtimes
            .get(&turn.session_id)
            .is_some_and(|runtime| runtime.reconciler.is_current_stream(turn.stream_id))
    }

    /// A deleted session's turn counts as cancelled.
    fn settled_outcome(&self, session_id: &str) -> TurnOutcome {
        self.runtimes
            .get(session_id)
            .and_then(|runtime| runtime.reconciler.state().outcome())
            .unwrap_or(TurnOutcome::Cancelled)
    }

    fn time_out(&mut self, session_id: &str) -> Option<TurnOutcome> {
        let runtime = self.runtimes.get_mut(session_id)?;
        let placeholder_id = runtime.reconciler.placeholder_id()?.to_string();
        let placeholder = self.store.message_mut(session_id, &placeholder_id)?;
        let outcome = runtime.reconciler.time_out(placeholder)?;
        self.finish_turn(session_id, &placeholder_id, outcome);
        Some(outcome)
    }

    fn open_draft(&mut self) -> String {
        let session_id = self.store.create_session();
        let conversation = self
            .draft
            .take()
            .unwrap_or_else(|| self.backend.start_conversation(&[]));
        self.runtimes
            .insert(session_id.clone(), SessionRuntime::new(conversation));
        self.active = Some(session_id.clone());
        self.events.emit(ChatEvent::ActiveSessionChanged {
            session_id: Some(session_id.clone()),
        });
        session_id
    }

    fn finish_turn(&mut self, session_id: &str, placeholder_id: &str, outcome: TurnOutcome) {
        let reply = self
            .store
            .get(session_id)
            .and_then(|session| session.messages.iter().find(|m| m.id == placeholder_id))
            .cloned();
        if let Some(runtime) = self.runtimes.get_mut(session_id) {
            let user = runtime.pending_user.take();
            // The model never saw fallback or stop-marker text as its own reply
            let reply = reply.filter(|reply| match outcome {
                TurnOutcome::Completed => true,
                TurnOutcome::Cancelled => reply.content != CANCELLED_REPLY,
                TurnOutcome::Failed => false,
            });
            if let (Some(user), Some(reply)) = (user, reply) {
                runtime.conversation.record_exchange(&user, &reply);
            }
        }
        self.store.commit(session_id);
        self.events.emit(ChatEvent::TurnFinished {
            session_id: session_id.to_string(),
            message_id: placeholder_id.to_string(),
            outcome,
        });
        self.persist_sessions();
    }

    fn persist_sessions(&self) {
        if let Err(err) = self.local.save_sessions(self.store.list_sessions()) {
            tracing::warn!("failed to save chat history: {err}");
        }
    }
}
