//! Data models for convoy-import
//!
//! - Canonical conversation shape
//! - Per-conversation replay state machine
//! - Plan limits
//! - Run outcomes

pub mod conversation;
pub mod import_summary;
pub mod import_session;
pub mod lenient;
pub mod plan;

pub use conversation::{
    Conversation, ConversationState, ConversationUser, FilePayload, Message, MessageFrom,
    MessageKind, MessageUser, OriginalContent,
};
pub use import_summary::{ConversationOutcome, FailedConversation, ImportSummary};
pub use import_session::{ConversationRun, ImportStep, InvalidTransition, StepTransition};
pub use plan::PlanLimits;
