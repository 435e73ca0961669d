//! WHMCS support tickets (XML export converted to JSON)
//!
//! The XML conversion collapses single-element collections, so `replies.reply`
//! and `notes.note` may each be an object or a list.

use super::{date_millis, decode, map_state, Adapter, AdapterCapabilities, AdapterError};
use crate::models::lenient::{self, OneOrMany};
use crate::models::{Conversation, ConversationState, ConversationUser, Message, MessageFrom};
use serde::Deserialize;
use serde_json::Value;

const NAME: &str = "whmcs";

const STATES: [(&str, ConversationState); 6] = [
    ("customer-reply", ConversationState::Unresolved),
    ("on-hold", ConversationState::Unresolved),
    ("in-progress", ConversationState::Unresolved),
    ("answered", ConversationState::Unresolved),
    ("open", ConversationState::Unresolved),
    ("closed", ConversationState::Resolved),
];

#[derive(Debug, Deserialize)]
struct Ticket {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    tid: Value,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    email: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    subject: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    status: Option<String>,
    #[serde(default, deserialize_with = "collection")]
    replies: Replies,
    #[serde(default, deserialize_with = "collection")]
    notes: Notes,
}

#[derive(Debug, Default, Deserialize)]
struct Replies {
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    reply: OneOrMany<Reply>,
}

#[derive(Debug, Default, Deserialize)]
struct Notes {
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    note: OneOrMany<Note>,
}

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    replyid: Value,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    email: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    date: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Note {
    #[serde(default)]
    noteid: Value,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    date: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    message: Option<String>,
}

/// An empty XML element comes out as `""` or `null`; both mean no items
fn collection<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Object(_) => serde_json::from_value(value).map_err(serde::de::Error::custom),
        _ => Ok(T::default()),
    }
}

/// WHMCS ticket → conversation
pub struct WhmcsAdapter;

impl Adapter for WhmcsAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::NORMALIZE
    }

    fn normalize(&self, raw: Value) -> Result<Conversation, AdapterError> {
        let ticket: Ticket = decode(NAME, raw)?;
        let ticket_email = ticket.email.clone();

        let replies = ticket.replies.reply.into_vec().into_iter().map(|reply| {
            let from = if reply.email.is_some() && reply.email == ticket_email {
                MessageFrom::User
            } else {
                MessageFrom::Operator
            };
            Message {
                origin: Some("chat".to_string()),
                fingerprint: lenient::value_to_i64(&reply.replyid),
                ..Message::text(
                    from,
                    date_millis(reply.date.as_deref()),
                    flatten(reply.message.unwrap_or_default()),
                )
            }
        });

        let notes = ticket.notes.note.into_vec().into_iter().map(|note| Message {
            origin: Some("chat".to_string()),
            fingerprint: lenient::value_to_i64(&note.noteid),
            ..Message::note(
                date_millis(note.date.as_deref()),
                flatten(note.message.unwrap_or_default()),
            )
        });

        let messages = replies.chain(notes).collect();
        let id = lenient::value_to_string(&ticket.id).or_else(|| lenient::value_to_string(&ticket.tid));

        Ok(Conversation {
            id,
            user: ConversationUser {
                name: ticket.name,
                email: ticket.email,
                ..Default::default()
            },
            subject: ticket.subject,
            messages,
            state: map_state(ticket.status.as_deref(), &STATES),
            ..Default::default()
        })
    }
}

fn flatten(message: String) -> String {
    message.replace("\r\n", " ").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageKind;
    use serde_json::json;

    #[test]
    fn test_normalize_ticket_with_collections() {
        let conversation = WhmcsAdapter
            .normalize(json!({
                "id": "812",
                "name": "Linus",
                "email": "linus@example.com",
                "subject": "Server down",
                "status": "Closed",
                "replies": { "reply": [
                    { "replyid": "0", "email": "linus@example.com", "date": "2019-02-03 10:00:00",
                      "message": "It is down\nagain" },
                    { "replyid": "9", "email": "support@host.example", "date": "2019-02-03 10:30:00",
                      "message": "Rebooted" }
                ]},
                "notes": { "note": { "noteid": "3", "date": "2019-02-03 10:20:00", "message": "Disk full" } }
            }))
            .unwrap();

        assert_eq!(conversation.id.as_deref(), Some("812"));
        assert_eq!(conversation.state, ConversationState::Resolved);
        assert_eq!(conversation.messages.len(), 3);

        let first = &conversation.messages[0];
        assert_eq!(first.from, MessageFrom::User);
        assert_eq!(first.text.as_deref(), Some("It is down again"));
        assert_eq!(first.fingerprint, Some(0));
        assert_eq!(first.date, 1_549_188_000_000);

        assert_eq!(conversation.messages[1].from, MessageFrom::Operator);

        let note = &conversation.messages[2];
        assert_eq!(note.kind(), MessageKind::Note);
        assert_eq!(note.note.as_deref(), Some("Disk full"));
        assert_eq!(note.fingerprint, Some(3));
    }

    #[test]
    fn test_empty_collections() {
        let conversation = WhmcsAdapter
            .normalize(json!({
                "id": 1,
                "status": "Customer-Reply",
                "replies": "",
                "notes": null
            }))
            .unwrap();

        assert!(conversation.messages.is_empty());
        assert_eq!(conversation.state, ConversationState::Unresolved);
    }
}
