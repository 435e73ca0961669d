//! Recording ChatApi mock
//!
//! Every call is appended to an in-memory log so tests can assert on the
//! exact sequence of remote operations.

use async_trait::async_trait;
use convoy_import::models::{ConversationState, MessageFrom};
use convoy_import::services::chat_client::{
    ChatApi, ChatApiError, ConversationMeta, OutboundMessage, Participant,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One recorded remote call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create,
    Meta(ConversationMeta),
    Participants(Vec<Participant>),
    Message(OutboundMessage),
    MarkRead { from: MessageFrom, origin: String },
    State(ConversationState),
}

/// Which operations fail
#[derive(Debug, Clone, Copy, Default)]
pub struct Failures {
    pub create: bool,
    pub meta: bool,
    pub participants: bool,
    pub messages: bool,
    pub read: bool,
    pub state: bool,
}

/// In-memory ChatApi
#[derive(Default)]
pub struct MockChatApi {
    calls: Mutex<Vec<Call>>,
    sessions: AtomicUsize,
    failures: Failures,
}

impl MockChatApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failures: Failures) -> Self {
        Self {
            failures,
            ..Self::default()
        }
    }

    /// All calls so far
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Sent messages, in order
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Message(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn create_count(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::Create)).count()
    }

    pub fn participants(&self) -> Option<Vec<Participant>> {
        self.calls().into_iter().find_map(|call| match call {
            Call::Participants(participants) => Some(participants),
            _ => None,
        })
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn outcome(&self, fail: bool, what: &str) -> Result<(), ChatApiError> {
        if fail {
            Err(ChatApiError::Api(500, format!("{} failed", what)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChatApi for MockChatApi {
    async fn create_conversation(&self) -> Result<String, ChatApiError> {
        self.record(Call::Create);
        self.outcome(self.failures.create, "create")?;
        let n = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("session_{}", n))
    }

    async fn update_meta(&self, _session_id: &str, meta: &ConversationMeta) -> Result<(), ChatApiError> {
        self.record(Call::Meta(meta.clone()));
        self.outcome(self.failures.meta, "meta")
    }

    async fn save_participants(
        &self,
        _session_id: &str,
        participants: &[Participant],
    ) -> Result<(), ChatApiError> {
        self.record(Call::Participants(participants.to_vec()));
        self.outcome(self.failures.participants, "participants")
    }

    async fn send_message(&self, _session_id: &str, message: &OutboundMessage) -> Result<(), ChatApiError> {
        self.record(Call::Message(message.clone()));
        self.outcome(self.failures.messages, "message")
    }

    async fn mark_read(&self, _session_id: &str, from: MessageFrom, origin: &str) -> Result<(), ChatApiError> {
        self.record(Call::MarkRead {
            from,
            origin: origin.to_string(),
        });
        self.outcome(self.failures.read, "read")
    }

    async fn change_state(&self, _session_id: &str, state: ConversationState) -> Result<(), ChatApiError> {
        self.record(Call::State(state));
        self.outcome(self.failures.state, "state")
    }
}
