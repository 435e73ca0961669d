//! Import outcomes and run summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Successful terminal outcome of one conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationOutcome {
    /// Replayed and checkpointed as imported
    Imported,
    /// Already imported in a previous run (resume mode)
    Skipped,
}

/// A conversation that failed, kept for manual re-submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedConversation {
    /// Conversation identifier, when the record had one
    pub conversation_id: Option<String>,

    /// Human-readable failure reason
    pub reason: String,

    pub occurred_at: DateTime<Utc>,
}

/// Pipeline completion summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Records pulled from the source
    pub processed: usize,

    /// Conversations imported in this run
    pub imported: usize,

    /// Conversations skipped because already imported
    pub skipped: usize,

    /// Conversations recorded as failed
    pub failed: usize,

    pub failures: Vec<FailedConversation>,

    /// Source closed without reaching the end of the array, or the run was
    /// cancelled between conversations
    pub closed_early: bool,

    pub duration_seconds: u64,
}

impl ImportSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_failure(&mut self, conversation_id: Option<String>, reason: String) {
        self.failed += 1;
        self.failures.push(FailedConversation {
            conversation_id,
            reason,
            occurred_at: Utc::now(),
        });
    }
}
