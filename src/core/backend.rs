//! The seam between conversation state and whatever model produces replies.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::{build_transcript, Content};
use crate::core::message::{Attachment, Message};

/// The only failure text a user ever sees from a backend.
pub const FALLBACK_REPLY: &str = "I'm having trouble connecting right now. Please try again later.";

#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    Chunk(String),
    /// Terminal failure carrying human-readable replacement text.
    Error(String),
    End,
}

/// A per-session conversation with the backend: the directive it was
/// started with plus every exchange recorded since.
#[derive(Clone, Debug, PartialEq)]
pub struct Conversation {
    system_instruction: String,
    history: Vec<Content>,
}

impl Conversation {
    pub fn new(system_instruction: impl Into<String>, prior: &[Message]) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            history: build_transcript(prior),
        }
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }

    /// Extends the transcript with one finished exchange.
    pub fn record_exchange(&mut self, user: &Message, reply: &Message) {
        for message in [user, reply] {
            if message.has_payload() && !message.is_streaming() {
                self.history.push(Content::from_message(message));
            }
        }
    }
}

pub trait ChatBackend {
    fn start_conversation(&self, prior: &[Message]) -> Conversation;

    /// Starts one turn. Fragments arrive lazily on the returned stream.
    fn send_turn(
        &self,
        conversation: &Conversation,
        text: &str,
        attachment: Option<&Attachment>,
    ) -> FragmentStream;
}

/// Consumer half of a turn: finite, forward-only, single consumption.
///
/// Closing or dropping the stream cancels the producer.
pub struct FragmentStream {
    rx: mpsc::UnboundedReceiver<StreamMessage>,
    cancel_token: CancellationToken,
    finished: bool,
}

/// Producer half handed to whatever task talks to the backend.
#[derive(Clone)]
pub struct FragmentSink {
    tx: mpsc::UnboundedSender<StreamMessage>,
    cancel_token: CancellationToken,
}

impl FragmentStream {
    pub fn channel() -> (FragmentSink, FragmentStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        (
            FragmentSink {
                tx,
                cancel_token: cancel_token.clone(),
            },
            FragmentStream {
                rx,
                cancel_token,
                finished: false,
            },
        )
    }

    /// Next message, or `None` once the stream has ended, failed, been
    /// closed, or lost its producer.
    pub async fn next(&mut self) -> Option<StreamMessage> {
        if self.finished {
            return None;
        }
        let message = tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => None,
            message = self.rx.recv() => message,
        };
        match &message {
            Some(StreamMessage::Chunk(_)) => {}
            Some(StreamMessage::Error(_)) | Some(StreamMessage::End) | None => {
                self.finished = true;
            }
        }
        message
    }

    pub fn close(&mut self) {
        self.cancel_token.cancel();
        self.rx.close();
        self.finished = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Token that stops this stream from another task.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }
}

impl Drop for FragmentStream {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

impl FragmentSink {
    /// Sends a non-empty fragment. Returns false once the consumer is gone.
    pub fn chunk(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text.is_empty() {
            return !self.is_closed();
        }
        self.tx.send(StreamMessage::Chunk(text)).is_ok()
    }

    pub fn fail(&self, message: impl Into<String>) {
        let _ = self.tx.send(StreamMessage::Error(message.into()));
    }

    pub fn end(&self) {
        let _ = self.tx.send(StreamMessage::End);
    }

    pub fn is_closed(&self) -> bool {
        self.cancel_token.is_cancelled() || self.tx.is_closed()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }
}
