//! Gorgias tickets (CSV exports converted to JSON)
//!
//! Gorgias exports tickets and messages separately. In the messages export
//! the `id` column holds the ticket id, so messages carry no fingerprint.

use super::{date_millis, decode, Adapter, AdapterCapabilities, AdapterError};
use crate::models::lenient;
use crate::models::{Conversation, ConversationState, ConversationUser, Message, MessageFrom};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

const NAME: &str = "gorgias";
const TICKET_ID: &str = "Ticket id";

#[derive(Debug, Deserialize)]
struct Ticket {
    #[serde(rename = "Ticket id", default)]
    ticket_id: Value,
    #[serde(rename = "Customer email", default, deserialize_with = "lenient::opt_string")]
    customer_email: Option<String>,
    #[serde(rename = "Customer name", default, deserialize_with = "lenient::opt_string")]
    customer_name: Option<String>,
    #[serde(rename = "Tags", default, deserialize_with = "lenient::opt_string")]
    tags: Option<String>,
    #[serde(rename = "Initial channel", default, deserialize_with = "lenient::opt_string")]
    initial_channel: Option<String>,
    #[serde(rename = "Last used integration type", default)]
    last_used_integration_type: Value,
    #[serde(rename = "Survey replied date", default)]
    survey_replied_date: Value,
    #[serde(rename = "Survey score", default)]
    survey_score: Value,
    #[serde(rename = "Subject", default, deserialize_with = "lenient::opt_string")]
    subject: Option<String>,
    #[serde(rename = "Closed date", default, deserialize_with = "lenient::opt_string")]
    closed_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    messages: Vec<GorgiasMessage>,
}

#[derive(Debug, Deserialize)]
struct GorgiasMessage {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    body_text: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    sent_datetime: Option<String>,
    #[serde(default, deserialize_with = "sender_address")]
    sender_info: Option<String>,
}

/// `sender_info` is an object with an `address`, or that object as a JSON
/// string when the CSV pre-pass left it encoded
fn sender_address<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let value = match value {
        Some(Value::String(encoded)) => serde_json::from_str(&encoded).unwrap_or(Value::Null),
        Some(other) => other,
        None => Value::Null,
    };
    Ok(value.get("address").and_then(lenient::value_to_string))
}

/// Gorgias ticket + message exports → conversations
pub struct GorgiasAdapter;

impl Adapter for GorgiasAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::GROUP_AND_NORMALIZE
    }

    fn group_conversations(
        &self,
        conversations: Vec<Value>,
        messages: Vec<Value>,
    ) -> Result<Vec<Value>, AdapterError> {
        if messages.is_empty() {
            return Err(AdapterError::failed(
                NAME,
                "There are no messages to import. Provide the tickets export as the \
                 input file and the messages export as the messages file.",
            ));
        }

        let mut by_ticket: HashMap<String, Vec<Value>> = HashMap::new();
        for message in messages {
            let Some(ticket_id) = message.get("id").and_then(lenient::value_to_string) else {
                continue;
            };
            by_ticket.entry(ticket_id).or_default().push(message);
        }

        conversations
            .into_iter()
            .map(|conversation| {
                let Value::Object(mut ticket) = conversation else {
                    return Err(AdapterError::failed(NAME, "ticket record is not an object"));
                };
                let messages = ticket
                    .get(TICKET_ID)
                    .and_then(lenient::value_to_string)
                    .and_then(|id| by_ticket.remove(&id))
                    .unwrap_or_default();
                ticket.insert("messages".to_string(), Value::Array(messages));
                Ok(Value::Object(ticket))
            })
            .collect()
    }

    fn normalize(&self, raw: Value) -> Result<Conversation, AdapterError> {
        let ticket: Ticket = decode(NAME, raw)?;
        let email = ticket.customer_email;

        let name = ticket.customer_name.or_else(|| {
            email
                .as_deref()
                .and_then(|e| e.split('@').next())
                .filter(|local| !local.is_empty())
                .map(str::to_string)
        });

        let mut segments: Vec<String> = ticket
            .tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        segments.extend(ticket.initial_channel);

        let mut data = Map::new();
        if let Some(ticket_id) = lenient::value_to_string(&ticket.ticket_id) {
            data.insert("ticket_id".to_string(), Value::String(ticket_id));
        }
        if !ticket.last_used_integration_type.is_null() {
            data.insert(
                "last_used_integration_type".to_string(),
                ticket.last_used_integration_type,
            );
        }
        if !ticket.survey_replied_date.is_null() {
            data.insert("survey_replied_date".to_string(), ticket.survey_replied_date);
            data.insert("survey_score".to_string(), ticket.survey_score);
        }

        let messages = ticket
            .messages
            .into_iter()
            .filter_map(|message| {
                let text = message.body_text?;
                let from = if email.is_some() && message.sender_info == email {
                    MessageFrom::User
                } else {
                    MessageFrom::Operator
                };
                Some(Message {
                    origin: Some("chat".to_string()),
                    ..Message::text(from, date_millis(message.sent_datetime.as_deref()), text)
                })
            })
            .collect();

        let state = if ticket.closed_date.is_some() {
            ConversationState::Resolved
        } else {
            ConversationState::Unresolved
        };

        Ok(Conversation {
            id: lenient::value_to_string(&ticket.ticket_id),
            user: ConversationUser {
                name,
                email,
                ..Default::default()
            },
            subject: ticket.subject,
            segments,
            data,
            messages,
            state,
            ..Default::default()
        })
    }
}
