//! Error types for convoy-import
//!
//! Errors are layered by blast radius:
//! - [`ConversationError`]: one conversation failed, the run continues
//! - everything else wrapped by [`ImportError`]: the run stops
//!
//! Per-message failures never surface as errors; they are logged where they
//! happen and the conversation carries on.

use crate::adapters::AdapterError;
use crate::models::InvalidTransition;
use crate::services::chat_client::ChatApiError;
use crate::services::record_source::SourceError;
use thiserror::Error;

/// Failure isolated to one conversation
#[derive(Debug, Error)]
pub enum ConversationError {
    /// Record does not match the conversation shape
    #[error("Invalid conversation record: {0}")]
    InvalidRecord(String),

    /// Nothing to replay (rejected locally, no remote call issued)
    #[error("No messages to import")]
    EmptyMessages,

    #[error("Couldn't create remote conversation: {0}")]
    RemoteCreate(#[source] ChatApiError),

    #[error("Couldn't update conversation metas: {0}")]
    MetaSync(#[source] ChatApiError),

    #[error("Couldn't change conversation state: {0}")]
    StateChange(#[source] ChatApiError),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

/// Run-level error
#[derive(Debug, Error)]
pub enum ImportError {
    /// One conversation failed; recorded, not fatal
    #[error(transparent)]
    Conversation(#[from] ConversationError),

    /// Input file unreadable or malformed
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Adapter missing, invalid or failing
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// Status registry could not be persisted
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[source] convoy_common::Error),

    /// convoy-common error (configuration, I/O)
    #[error("Common error: {0}")]
    Common(#[from] convoy_common::Error),
}

impl ImportError {
    /// Whether the whole run must stop
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ImportError::Conversation(_))
    }
}

/// Result type for pipeline operations
pub type ImportResult<T> = Result<T, ImportError>;
