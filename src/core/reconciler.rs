//! Per-session turn state: folds a fragment stream into one placeholder reply.
//!
//! A turn moves `Idle → AwaitingFirstFragment → Streaming` and ends in
//! exactly one of `Complete`, `Cancelled` or `Failed`. Every terminal
//! transition freezes the placeholder, so no reply stays marked as streaming.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::core::backend::{StreamMessage, FALLBACK_REPLY};
use crate::core::message::Message;

pub const CANCELLED_REPLY: &str = "Response stopped.";
pub const TIMEOUT_REPLY: &str = "The response took too long. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingFirstFragment,
    Streaming,
    Complete,
    Cancelled,
    Failed,
}

impl TurnState {
    /// True while the generation guard is held.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            TurnState::AwaitingFirstFragment | TurnState::Streaming
        )
    }

    pub fn outcome(self) -> Option<TurnOutcome> {
        match self {
            TurnState::Complete => Some(TurnOutcome::Completed),
            TurnState::Cancelled => Some(TurnOutcome::Cancelled),
            TurnState::Failed => Some(TurnOutcome::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Cancelled,
    Failed,
}

impl TurnOutcome {
    fn state(self) -> TurnState {
        match self {
            TurnOutcome::Completed => TurnState::Complete,
            TurnOutcome::Cancelled => TurnState::Cancelled,
            TurnOutcome::Failed => TurnState::Failed,
        }
    }
}

/// Effect of one stream message on the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Stale stream, finished turn, or empty fragment.
    Ignored,
    Appended,
    Finished(TurnOutcome),
}

#[derive(Debug)]
pub struct StreamingReconciler {
    state: TurnState,
    current_stream_id: u64,
    placeholder_id: Option<String>,
    cancel_token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl Default for StreamingReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingReconciler {
    pub fn new() -> Self {
        Self {
            state: TurnState::Idle,
            current_stream_id: 0,
            placeholder_id: None,
            cancel_token: None,
            deadline: None,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_generating(&self) -> bool {
        self.state.is_active()
    }

    pub fn placeholder_id(&self) -> Option<&str> {
        self.placeholder_id.as_deref()
    }

    pub fn current_stream_id(&self) -> u64 {
        self.current_stream_id
    }

    pub fn is_current_stream(&self, stream_id: u64) -> bool {
        self.state.is_active() && stream_id == self.current_stream_id
    }

    pub fn is_overdue(&self, now: Instant) -> bool {
        self.is_generating() && self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Takes the generation guard for a new turn whose reply lives in
    /// `placeholder_id`. `cancel_token` is cancelled when the turn settles,
    /// releasing the fragment source. Returns the turn's stream id, or
    /// `None` while another turn is in flight.
    pub fn begin(
        &mut self,
        placeholder_id: String,
        cancel_token: CancellationToken,
        timeout: Duration,
    ) -> Option<u64> {
        if self.is_generating() {
            return None;
        }
        self.current_stream_id += 1;
        self.state = TurnState::AwaitingFirstFragment;
        self.placeholder_id = Some(placeholder_id);
        self.cancel_token = Some(cancel_token);
        self.deadline = Some(Instant::now() + timeout);
        tracing::debug!("turn {} started", self.current_stream_id);
        Some(self.current_stream_id)
    }

    pub fn apply(
        &mut self,
        stream_id: u64,
        message: StreamMessage,
        placeholder: &mut Message,
    ) -> Reconciled {
        if !self.is_current_stream(stream_id) {
            return Reconciled::Ignored;
        }
        match message {
            StreamMessage::Chunk(fragment) => {
                if fragment.is_empty() || !placeholder.push_fragment(&fragment) {
                    return Reconciled::Ignored;
                }
                self.state = TurnState::Streaming;
                Reconciled::Appended
            }
            StreamMessage::End if placeholder.content.is_empty() => {
                tracing::debug!("turn {stream_id} ended without content");
                Reconciled::Finished(self.fail(placeholder, FALLBACK_REPLY))
            }
            StreamMessage::End => {
                placeholder.finish();
                Reconciled::Finished(self.settle(TurnOutcome::Completed))
            }
            StreamMessage::Error(text) => {
                let text = if text.trim().is_empty() {
                    FALLBACK_REPLY
                } else {
                    text.as_str()
                };
                Reconciled::Finished(self.fail(placeholder, text))
            }
        }
    }

    /// Stops the turn, keeping whatever content already arrived.
    pub fn cancel(&mut self, placeholder: &mut Message) -> Option<TurnOutcome> {
        if !self.is_generating() {
            return None;
        }
        if placeholder.content.is_empty() {
            placeholder.push_fragment(CANCELLED_REPLY);
        }
        placeholder.finish();
        Some(self.settle(TurnOutcome::Cancelled))
    }

    /// Fails the turn with the timeout text regardless of its deadline.
    pub fn time_out(&mut self, placeholder: &mut Message) -> Option<TurnOutcome> {
        if !self.is_generating() {
            return None;
        }
        tracing::debug!("turn {} timed out", self.current_stream_id);
        Some(self.fail(placeholder, TIMEOUT_REPLY))
    }

    /// Releases the guard when the placeholder no longer exists.
    pub fn abandon(&mut self) {
        if self.is_generating() {
            self.settle(TurnOutcome::Cancelled);
        }
    }

    fn fail(&mut self, placeholder: &mut Message, text: &str) -> TurnOutcome {
        if !placeholder.content.is_empty() {
            placeholder.push_fragment("\n\n");
        }
        placeholder.push_fragment(text);
        placeholder.finish();
        self.settle(TurnOutcome::Failed)
    }

    fn settle(&mut self, outcome: TurnOutcome) -> TurnOutcome {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.deadline = None;
        self.state = outcome.state();
        tracing::debug!("turn {} finished: {outcome:?}", self.current_stream_id);
        outcome
    }
}
