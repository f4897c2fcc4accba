use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use tempfile::TempDir;

use crate::core::app::ChatController;
use crate::core::backend::{ChatBackend, Conversation, FragmentSink, FragmentStream, FALLBACK_REPLY};
use crate::core::message::{Attachment, Message};
use crate::core::persistence::LocalStore;

pub const TEST_DIRECTIVE: &str = "test directive";

/// What the scripted backend does for one turn.
#[derive(Clone, Debug)]
pub enum Script {
    /// Every fragment, then a normal end.
    Reply(Vec<String>),
    /// The fragments, then the fallback failure.
    FailAfter(Vec<String>),
    /// Nothing is sent; the sink is kept for the test to drive.
    Hold,
}

impl Script {
    pub fn reply(fragments: &[&str]) -> Self {
        Script::Reply(fragments.iter().map(|f| f.to_string()).collect())
    }

    pub fn fail_after(fragments: &[&str]) -> Self {
        Script::FailAfter(fragments.iter().map(|f| f.to_string()).collect())
    }
}

/// One `send_turn` call as the backend saw it.
#[derive(Clone, Debug)]
pub struct SentTurn {
    pub conversation: Conversation,
    pub text: String,
    pub attachment: Option<Attachment>,
}

/// Backend that answers from a queue of scripts instead of the network.
/// With an empty queue every turn is held.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: RefCell<VecDeque<Script>>,
    sent: RefCell<Vec<SentTurn>>,
    held: RefCell<Vec<FragmentSink>>,
}

impl ScriptedBackend {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: RefCell::new(scripts.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn push(&self, script: Script) {
        self.scripts.borrow_mut().push_back(script);
    }

    pub fn sent(&self) -> Vec<SentTurn> {
        self.sent.borrow().clone()
    }

    /// Sink of the most recent held turn.
    pub fn held_sink(&self) -> FragmentSink {
        self.held.borrow().last().cloned().expect("no held turn")
    }
}

impl ChatBackend for ScriptedBackend {
    fn start_conversation(&self, prior: &[Message]) -> Conversation {
        Conversation::new(TEST_DIRECTIVE, prior)
    }

    fn send_turn(
        &self,
        conversation: &Conversation,
        text: &str,
        attachment: Option<&Attachment>,
    ) -> FragmentStream {
        self.sent.borrow_mut().push(SentTurn {
            conversation: conversation.clone(),
            text: text.to_string(),
            attachment: attachment.cloned(),
        });

        let (sink, stream) = FragmentStream::channel();
        let script = self
            .scripts
            .borrow_mut()
            .pop_front()
            .unwrap_or(Script::Hold);
        match script {
            Script::Reply(fragments) => {
                for fragment in fragments {
                    sink.chunk(fragment);
                }
                sink.end();
            }
            Script::FailAfter(fragments) => {
                for fragment in fragments {
                    sink.chunk(fragment);
                }
                sink.fail(FALLBACK_REPLY);
            }
            Script::Hold => self.held.borrow_mut().push(sink),
        }
        stream
    }
}

pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn create_test_controller(
    scripts: impl IntoIterator<Item = Script>,
) -> (ChatController<ScriptedBackend>, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let controller = controller_in(&temp_dir, ScriptedBackend::new(scripts), TEST_TIMEOUT);
    (controller, temp_dir)
}

pub fn controller_in(
    temp_dir: &TempDir,
    backend: ScriptedBackend,
    turn_timeout: Duration,
) -> ChatController<ScriptedBackend> {
    ChatController::new(backend, LocalStore::new(temp_dir.path()), turn_timeout)
}
