//! Tidio chat export
//!
//! Tidio exports a flat list of messages. Grouping gathers them per
//! `CONVERSATION_ID`, then each group is normalized. Message ids in the
//! export are conversation ids, so no fingerprint is set.

use super::{date_millis, decode, full_name, Adapter, AdapterCapabilities, AdapterError};
use crate::models::lenient;
use crate::models::{Conversation, ConversationState, ConversationUser, Message, MessageFrom};
use serde::Deserialize;
use serde_json::{json, Value};

const NAME: &str = "tidio";

#[derive(Debug, Deserialize)]
struct Group {
    #[serde(default)]
    id: Value,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    messages: Vec<TidioMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct TidioMessage {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    sender: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    time_sent: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    message_content: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    channel: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    first_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    last_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    email: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    phone: Option<String>,
}

impl TidioMessage {
    fn from_visitor(&self) -> bool {
        self.sender.as_deref() == Some("visitor")
    }
}

/// Visitor identity, first value seen wins
#[derive(Debug, Default)]
struct Visitor {
    first_name: Option<String>,
    last_name: Option<String>,
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

impl Visitor {
    fn absorb(&mut self, message: &TidioMessage) {
        if !message.from_visitor() {
            return;
        }
        fill(&mut self.first_name, &message.first_name);
        fill(&mut self.last_name, &message.last_name);
        fill(&mut self.name, &message.name);
        fill(&mut self.email, &message.email);
        fill(&mut self.phone, &message.phone);
    }

    fn display_name(&self) -> Option<String> {
        full_name(self.first_name.as_deref(), self.last_name.as_deref()).or_else(|| self.name.clone())
    }
}

fn fill(slot: &mut Option<String>, value: &Option<String>) {
    if slot.is_none() {
        slot.clone_from(value);
    }
}

/// Tidio message export → conversations
pub struct TidioAdapter;

impl Adapter for TidioAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::GROUP_AND_NORMALIZE
    }

    /// Both inputs are message lists; they are grouped together
    fn group_conversations(
        &self,
        conversations: Vec<Value>,
        messages: Vec<Value>,
    ) -> Result<Vec<Value>, AdapterError> {
        let mut order: Vec<String> = Vec::new();
        let mut groups: std::collections::HashMap<String, Vec<Value>> = Default::default();

        for message in conversations.into_iter().chain(messages) {
            let Some(id) = message.get("CONVERSATION_ID").and_then(lenient::value_to_string) else {
                tracing::warn!("Tidio message without CONVERSATION_ID, skipping");
                continue;
            };
            groups
                .entry(id.clone())
                .or_insert_with(|| {
                    order.push(id);
                    Vec::new()
                })
                .push(message);
        }

        Ok(order
            .into_iter()
            .map(|id| {
                let messages = groups.remove(&id).unwrap_or_default();
                json!({ "id": id, "messages": messages })
            })
            .collect())
    }

    fn normalize(&self, raw: Value) -> Result<Conversation, AdapterError> {
        let group: Group = decode(NAME, raw)?;

        let mut visitor = Visitor::default();
        let messages = group
            .messages
            .into_iter()
            .map(|message| {
                visitor.absorb(&message);
                let from = if message.from_visitor() {
                    MessageFrom::User
                } else {
                    MessageFrom::Operator
                };
                Message {
                    origin: message.channel,
                    ..Message::text(
                        from,
                        date_millis(message.time_sent.as_deref()),
                        message.message_content.unwrap_or_default(),
                    )
                }
            })
            .collect();

        Ok(Conversation {
            id: lenient::value_to_string(&group.id),
            user: ConversationUser {
                name: visitor.display_name(),
                email: visitor.email,
                phone: visitor.phone,
                ..Default::default()
            },
            messages,
            state: ConversationState::Resolved,
            ..Default::default()
        })
    }
}
