//! Per-conversation replay state machine
//!
//! A conversation run progresses through strictly sequential steps:
//! START → ADAPTED → RESUME_CHECKED → REMOTE_CREATED → META_SYNCED →
//! PARTICIPANTS_SYNCED → OPENING_NOTE_SENT → MESSAGES_REPLAYED →
//! READ_MARKED_USER → READ_MARKED_OPERATOR → CLOSING_NOTE_SENT →
//! STATE_TRANSITIONED → CHECKPOINTED
//!
//! SKIPPED is reachable from RESUME_CHECKED only; FAILED from any
//! non-terminal step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Conversation import step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStep {
    Start,
    /// Raw record normalized into a Conversation
    Adapted,
    /// Checkpoint consulted (resume mode)
    ResumeChecked,
    /// Remote conversation opened, session id bound
    RemoteCreated,
    MetaSynced,
    ParticipantsSynced,
    OpeningNoteSent,
    MessagesReplayed,
    ReadMarkedUser,
    ReadMarkedOperator,
    ClosingNoteSent,
    StateTransitioned,
    /// Recorded as imported
    Checkpointed,
    /// Already imported in a previous run
    Skipped,
    /// Recorded as failed
    Failed,
}

impl ImportStep {
    /// Successor on the success path (None for terminal steps)
    pub fn next(self) -> Option<ImportStep> {
        use ImportStep::*;
        match self {
            Start => Some(Adapted),
            Adapted => Some(ResumeChecked),
            ResumeChecked => Some(RemoteCreated),
            RemoteCreated => Some(MetaSynced),
            MetaSynced => Some(ParticipantsSynced),
            ParticipantsSynced => Some(OpeningNoteSent),
            OpeningNoteSent => Some(MessagesReplayed),
            MessagesReplayed => Some(ReadMarkedUser),
            ReadMarkedUser => Some(ReadMarkedOperator),
            ReadMarkedOperator => Some(ClosingNoteSent),
            ClosingNoteSent => Some(StateTransitioned),
            StateTransitioned => Some(Checkpointed),
            Checkpointed | Skipped | Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ImportStep::Checkpointed | ImportStep::Skipped | ImportStep::Failed
        )
    }

    /// Whether `self → to` is a legal move
    pub fn can_transition_to(self, to: ImportStep) -> bool {
        if self.is_terminal() {
            return false;
        }
        match to {
            ImportStep::Failed => true,
            ImportStep::Skipped => self == ImportStep::ResumeChecked,
            other => self.next() == Some(other),
        }
    }
}

/// Illegal step change
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid transition {from:?} → {to:?}")]
pub struct InvalidTransition {
    pub from: ImportStep,
    pub to: ImportStep,
}

/// Step transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTransition {
    pub old_step: ImportStep,
    pub new_step: ImportStep,
    pub transitioned_at: DateTime<Utc>,
}

/// State of one importer run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRun {
    /// Conversation identifier (known after adaptation)
    pub conversation_id: Option<String>,

    /// Remote session identifier (bound at REMOTE_CREATED)
    pub session_id: Option<String>,

    pub step: ImportStep,

    pub transitions: Vec<StepTransition>,

    pub started_at: DateTime<Utc>,

    /// Set when a terminal step is reached
    pub ended_at: Option<DateTime<Utc>>,
}

impl ConversationRun {
    pub fn new() -> Self {
        Self {
            conversation_id: None,
            session_id: None,
            step: ImportStep::Start,
            transitions: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Move to `new_step`, rejecting anything but the next step, SKIPPED
    /// after the resume check, or FAILED
    pub fn transition_to(&mut self, new_step: ImportStep) -> Result<StepTransition, InvalidTransition> {
        if !self.step.can_transition_to(new_step) {
            return Err(InvalidTransition {
                from: self.step,
                to: new_step,
            });
        }

        let transition = StepTransition {
            old_step: self.step,
            new_step,
            transitioned_at: Utc::now(),
        };
        self.step = new_step;
        self.transitions.push(transition.clone());

        if new_step.is_terminal() {
            self.ended_at = Some(Utc::now());
        }

        tracing::debug!(
            conversation_id = self.conversation_id.as_deref().unwrap_or("-"),
            from = ?transition.old_step,
            to = ?new_step,
            "Conversation step"
        );

        Ok(transition)
    }

    /// Steps visited so far, starting with START
    pub fn visited(&self) -> Vec<ImportStep> {
        std::iter::once(ImportStep::Start)
            .chain(self.transitions.iter().map(|t| t.new_step))
            .collect()
    }

    pub fn is_terminal(&self) -> bool {
        self.step.is_terminal()
    }
}

impl Default for ConversationRun {
    fn default() -> Self {
        Self::new()
    }
}
