//! Conversation importer
//!
//! Replays one conversation against the remote platform, step by step, and
//! records the outcome in the status registry. See [`ImportStep`] for the
//! step order.
//!
//! Failure handling per step:
//! - create / metas / final state: the conversation fails
//! - participants / messages / read marks: logged, the conversation carries on
//! - adapter errors and checkpoint writes: the whole run stops

use super::chat_client::{
    ChatApi, ConversationMeta, Coordinates, DeviceMeta, Geolocation, Participant,
};
use super::message_sender::{MessageSender, SendLimits};
use super::status_registry::StatusRegistry;
use crate::adapters::Adapter;
use crate::error::{ConversationError, ImportError, ImportResult};
use crate::models::{
    Conversation, ConversationOutcome, ConversationRun, ImportStep, Message, MessageFrom,
    MessageUser, PlanLimits,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Markers sit this far outside the replayed message range
pub const MARKER_OFFSET_MS: i64 = 60_000;

/// Pause between the closing calls of a conversation
pub const DEFAULT_TEMPORIZE: Duration = Duration::from_millis(500);

/// Author name of the opening and closing markers
pub const DEFAULT_MARKER_NAME: &str = "Import";

const READ_ORIGIN: &str = "chat";

/// Importer behaviour knobs
#[derive(Debug, Clone)]
pub struct ImporterSettings {
    /// Default message origin
    pub plugin_urn: String,
    pub default_email: Option<String>,
    pub default_nickname: Option<String>,
    /// Author of the import markers
    pub marker_name: String,
    /// Skip conversations already checkpointed as imported
    pub resume: bool,
    pub plan: PlanLimits,
    pub send_limits: SendLimits,
    pub temporize: Duration,
}

impl ImporterSettings {
    pub fn new(plugin_urn: impl Into<String>) -> Self {
        Self {
            plugin_urn: plugin_urn.into(),
            default_email: None,
            default_nickname: None,
            marker_name: DEFAULT_MARKER_NAME.to_string(),
            resume: false,
            plan: PlanLimits::default(),
            send_limits: SendLimits::default(),
            temporize: DEFAULT_TEMPORIZE,
        }
    }
}

/// Per-conversation replay service
pub struct ConversationImporter {
    api: Arc<dyn ChatApi>,
    adapter: Option<Arc<dyn Adapter>>,
    registry: StatusRegistry,
    sender: MessageSender,
    settings: ImporterSettings,
}

impl ConversationImporter {
    pub fn new(
        api: Arc<dyn ChatApi>,
        adapter: Option<Arc<dyn Adapter>>,
        registry: StatusRegistry,
        settings: ImporterSettings,
    ) -> Self {
        let sender = MessageSender::new(
            settings.send_limits,
            settings.plan,
            settings.plugin_urn.clone(),
            settings.default_nickname.clone(),
        );

        Self {
            api,
            adapter,
            registry,
            sender,
            settings,
        }
    }

    /// Import one raw record
    ///
    /// Returns `Ok` for imported and resume-skipped conversations.
    /// [`ImportError::Conversation`] means this conversation failed and was
    /// checkpointed as such; any other error is fatal to the run.
    pub async fn import_conversation(&mut self, raw: Value) -> ImportResult<ConversationOutcome> {
        let mut run = ConversationRun::new();

        let conversation = match self.adapt(raw) {
            Ok(conversation) => conversation,
            Err(ImportError::Conversation(e)) => {
                advance(&mut run, ImportStep::Failed)?;
                return Err(e.into());
            }
            Err(e) => return Err(e),
        };
        run.conversation_id = conversation.id.clone();
        advance(&mut run, ImportStep::Adapted)?;

        let already_imported = self.settings.resume
            && conversation
                .id
                .as_deref()
                .is_some_and(|id| self.registry.is_imported(id));
        advance(&mut run, ImportStep::ResumeChecked)?;

        if already_imported {
            tracing::info!(
                conversation_id = conversation.id.as_deref().unwrap_or("-"),
                "Conversation already imported, skipping"
            );
            advance(&mut run, ImportStep::Skipped)?;
            return Ok(ConversationOutcome::Skipped);
        }

        match self.replay(&conversation, &mut run).await {
            Ok(()) => {
                self.checkpoint(&conversation, true)?;
                advance(&mut run, ImportStep::Checkpointed)?;
                Ok(ConversationOutcome::Imported)
            }
            Err(e) => {
                tracing::debug!(
                    conversation_id = conversation.id.as_deref().unwrap_or("-"),
                    steps = ?run.visited(),
                    "Replay stopped"
                );
                advance(&mut run, ImportStep::Failed)?;
                self.checkpoint(&conversation, false)?;
                Err(e.into())
            }
        }
    }

    pub fn registry(&self) -> &StatusRegistry {
        &self.registry
    }

    pub fn adapter(&self) -> Option<&Arc<dyn Adapter>> {
        self.adapter.as_ref()
    }

    pub fn settings(&self) -> &ImporterSettings {
        &self.settings
    }

    fn adapt(&self, raw: Value) -> ImportResult<Conversation> {
        match &self.adapter {
            Some(adapter) if adapter.capabilities().normalize => Ok(adapter.normalize(raw)?),
            _ => serde_json::from_value(raw)
                .map_err(|e| ConversationError::InvalidRecord(e.to_string()).into()),
        }
    }

    /// Remote part of the run, from the empty-messages guard to the final state
    async fn replay(
        &self,
        conversation: &Conversation,
        run: &mut ConversationRun,
    ) -> Result<(), ConversationError> {
        if conversation.messages.is_empty() {
            return Err(ConversationError::EmptyMessages);
        }

        let session_id = self
            .api
            .create_conversation()
            .await
            .map_err(ConversationError::RemoteCreate)?;
        run.session_id = Some(session_id.clone());
        advance(run, ImportStep::RemoteCreated)?;

        let meta = build_meta(conversation, &self.settings);
        self.api
            .update_meta(&session_id, &meta)
            .await
            .map_err(ConversationError::MetaSync)?;
        advance(run, ImportStep::MetaSynced)?;

        self.sync_participants(&session_id, conversation).await;
        advance(run, ImportStep::ParticipantsSynced)?;

        let mut messages: Vec<&Message> = conversation.messages.iter().collect();
        messages.sort_by_key(|message| message.date);
        let first_date = messages.first().map(|m| m.date).unwrap_or_default();
        let last_date = messages.last().map(|m| m.date).unwrap_or_default();

        let marker_user = MessageUser {
            name: Some(self.settings.marker_name.clone()),
            avatar: None,
        };

        let opening = marker_note("Import started at", first_date.saturating_sub(MARKER_OFFSET_MS));
        self.sender
            .send(self.api.as_ref(), &session_id, &opening, &marker_user)
            .await;
        advance(run, ImportStep::OpeningNoteSent)?;

        let conversation_user = MessageUser::from(&conversation.user);
        for message in &messages {
            let author = message.user.as_ref().unwrap_or(&conversation_user);
            self.sender
                .send(self.api.as_ref(), &session_id, message, author)
                .await;
        }
        tracing::debug!(session_id = %session_id, messages = messages.len(), "Messages replayed");
        advance(run, ImportStep::MessagesReplayed)?;

        self.temporize().await;
        self.mark_read(&session_id, MessageFrom::User).await;
        advance(run, ImportStep::ReadMarkedUser)?;

        self.temporize().await;
        self.mark_read(&session_id, MessageFrom::Operator).await;
        advance(run, ImportStep::ReadMarkedOperator)?;

        self.temporize().await;
        let closing = marker_note("Import ended at", last_date.saturating_add(MARKER_OFFSET_MS));
        self.sender
            .send(self.api.as_ref(), &session_id, &closing, &marker_user)
            .await;
        advance(run, ImportStep::ClosingNoteSent)?;

        self.temporize().await;
        self.api
            .change_state(&session_id, conversation.state)
            .await
            .map_err(ConversationError::StateChange)?;
        advance(run, ImportStep::StateTransitioned)?;

        Ok(())
    }

    async fn sync_participants(&self, session_id: &str, conversation: &Conversation) {
        if conversation.participants.is_empty() {
            return;
        }

        let participants: Vec<Participant> = conversation
            .participants
            .iter()
            .map(Participant::email)
            .collect();

        let (participants, dropped) = self.settings.plan.clip_participants(participants);
        if dropped > 0 {
            tracing::warn!(
                session_id,
                dropped,
                "Too many participants for plan {}, keeping the first {}",
                self.settings.plan.name,
                participants.len()
            );
        }

        if let Err(e) = self.api.save_participants(session_id, &participants).await {
            tracing::error!(session_id, error = %e, "Couldn't save conversation participants");
        }
    }

    async fn mark_read(&self, session_id: &str, from: MessageFrom) {
        if let Err(e) = self.api.mark_read(session_id, from, READ_ORIGIN).await {
            tracing::error!(
                session_id,
                from = from.as_str(),
                error = %e,
                "Couldn't mark messages as read"
            );
        }
    }

    async fn temporize(&self) {
        if !self.settings.temporize.is_zero() {
            tokio::time::sleep(self.settings.temporize).await;
        }
    }

    fn checkpoint(&mut self, conversation: &Conversation, imported: bool) -> ImportResult<()> {
        let Some(id) = conversation.id.as_deref() else {
            tracing::debug!("Conversation has no id, not checkpointed");
            return Ok(());
        };

        self.registry
            .record(id, imported)
            .map_err(ImportError::Checkpoint)
    }
}

fn advance(run: &mut ConversationRun, step: ImportStep) -> Result<(), ConversationError> {
    run.transition_to(step)?;
    Ok(())
}

/// Operator note stamped with the current UTC time
fn marker_note(label: &str, date: i64) -> Message {
    let stamp = convoy_common::time::to_http_date(convoy_common::time::now());
    Message::note(date, format!("{}: {}", label, stamp))
}

/// Metas sent right after creation; empty fields are left out
pub fn build_meta(conversation: &Conversation, settings: &ImporterSettings) -> ConversationMeta {
    let user = &conversation.user;

    let device = DeviceMeta {
        locales: (!user.locales.is_empty()).then(|| user.locales.clone()),
        geolocation: user.country.clone().map(|country| Geolocation {
            country,
            coordinates: Coordinates::default(),
        }),
    };

    let segments: Vec<String> = conversation
        .segments
        .iter()
        .filter(|segment| !segment.is_empty())
        .cloned()
        .collect();

    ConversationMeta {
        email: user.email.clone().or_else(|| settings.default_email.clone()),
        phone: user.phone.clone(),
        nickname: user.name.clone().or_else(|| settings.default_nickname.clone()),
        avatar: user.avatar.clone(),
        device: (!device.is_empty()).then_some(device),
        subject: conversation.subject.clone(),
        segments: (!segments.is_empty()).then_some(segments),
        data: (!conversation.data.is_empty()).then(|| conversation.data.clone()),
    }
}
