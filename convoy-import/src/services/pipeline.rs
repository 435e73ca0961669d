//! Pipeline driver
//!
//! Pulls records from a [`RecordSource`] strictly one at a time, hands each
//! to the [`ConversationImporter`] and waits a fixed delay after every
//! settled conversation so the remote API is never flooded.

use super::conversation_importer::ConversationImporter;
use super::record_source::{read_all, RecordSource, SourceEvent};
use crate::adapters::AdapterError;
use crate::error::{ImportError, ImportResult};
use crate::models::lenient;
use crate::models::{ConversationOutcome, ImportSummary};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Pause after each conversation
pub const DEFAULT_BACKPRESSURE: Duration = Duration::from_millis(500);

/// Source → adapter → importer driver
pub struct Pipeline {
    importer: ConversationImporter,
    backpressure: Duration,
    cancel_token: CancellationToken,
}

impl Pipeline {
    pub fn new(importer: ConversationImporter, backpressure: Duration) -> Self {
        Self {
            importer,
            backpressure,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Stop between conversations once `token` is cancelled
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Import every conversation of a JSON array file
    pub async fn import_file(&mut self, path: &Path) -> ImportResult<ImportSummary> {
        tracing::info!(path = %path.display(), "Starting import");
        let source = RecordSource::open(path).await?;
        self.run(source).await
    }

    /// Group exports with the adapter, then import the result
    ///
    /// Inputs are read whole; grouping needs to see every message. Without a
    /// messages file the adapter groups the first export alone.
    pub async fn import_grouped(
        &mut self,
        conversations_path: &Path,
        messages_path: Option<&Path>,
    ) -> ImportResult<ImportSummary> {
        let adapter = match self.importer.adapter() {
            Some(adapter) if adapter.capabilities().group => adapter.clone(),
            Some(adapter) => {
                return Err(AdapterError::Unsupported {
                    adapter: adapter.name().to_string(),
                    capability: "group",
                }
                .into())
            }
            None => {
                return Err(convoy_common::Error::Config(
                    "Grouping conversations requires an adapter".to_string(),
                )
                .into())
            }
        };

        tracing::info!(
            adapter = adapter.name(),
            conversations = %conversations_path.display(),
            messages = ?messages_path,
            "Starting grouped import"
        );

        let conversations = read_all(conversations_path).await?;
        let messages = match messages_path {
            Some(path) => read_all(path).await?,
            None => Vec::new(),
        };
        let grouped = adapter.group_conversations(conversations, messages)?;

        tracing::info!(conversations = grouped.len(), "Grouped conversations");
        self.run(RecordSource::from_records(grouped)).await
    }

    /// Drive `source` to its end
    pub async fn run(&mut self, mut source: RecordSource) -> ImportResult<ImportSummary> {
        let started = Instant::now();
        let mut summary = ImportSummary::new();

        loop {
            if self.cancel_token.is_cancelled() {
                tracing::warn!(processed = summary.processed, "Import cancelled");
                summary.closed_early = true;
                break;
            }

            let raw = match source.next_event().await? {
                SourceEvent::Record(raw) => raw,
                SourceEvent::End => break,
                SourceEvent::Closed => {
                    summary.closed_early = true;
                    break;
                }
            };
            summary.processed += 1;

            let payload = raw.clone();
            match self.importer.import_conversation(raw).await {
                Ok(ConversationOutcome::Imported) => {
                    summary.imported += 1;
                    tracing::info!(imported = summary.imported, "Imported conversation");
                }
                Ok(ConversationOutcome::Skipped) => summary.skipped += 1,
                Err(ImportError::Conversation(e)) => {
                    let conversation_id = payload.get("id").and_then(lenient::value_to_string);
                    tracing::error!(
                        conversation_id = conversation_id.as_deref().unwrap_or("-"),
                        payload = %payload,
                        error = %e,
                        "Couldn't import conversation"
                    );
                    summary.record_failure(conversation_id, e.to_string());
                }
                Err(e) => {
                    tracing::error!(error = %e, processed = summary.processed, "Import aborted");
                    return Err(e);
                }
            }

            self.backpressure().await;
        }

        summary.duration_seconds = started.elapsed().as_secs();
        tracing::info!(
            processed = summary.processed,
            imported = summary.imported,
            skipped = summary.skipped,
            failed = summary.failed,
            closed_early = summary.closed_early,
            duration_seconds = summary.duration_seconds,
            "Import finished"
        );

        Ok(summary)
    }

    async fn backpressure(&self) {
        if self.backpressure.is_zero() {
            return;
        }
        tokio::select! {
            _ = self.cancel_token.cancelled() => {}
            _ = tokio::time::sleep(self.backpressure) => {}
        }
    }

    pub fn importer(&self) -> &ConversationImporter {
        &self.importer
    }
}
