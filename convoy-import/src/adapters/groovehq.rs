//! GrooveHQ tickets (API export with embedded actions)
//!
//! Message actions become text or note messages, their attachments become
//! separate file messages and CC'd addresses become participants. The
//! ticket status is only trusted when the last action is a state change.

use super::{channel_origin, date_millis, decode, full_name, html, Adapter, AdapterCapabilities, AdapterError};
use crate::models::lenient;
use crate::models::{
    Conversation, ConversationState, ConversationUser, FilePayload, Message, MessageFrom,
    MessageUser, OriginalContent,
};
use serde::Deserialize;
use serde_json::Value;

const NAME: &str = "groovehq";

#[derive(Debug, Deserialize)]
struct Ticket {
    #[serde(default)]
    number: Value,
    #[serde(default)]
    id: Value,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    status: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient::opt_string")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    tags: Vec<String>,
    #[serde(default)]
    customer: Option<CustomerEnvelope>,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
struct CustomerEnvelope {
    #[serde(default)]
    customer: Option<Customer>,
}

#[derive(Debug, Deserialize)]
struct Customer {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    first_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    last_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    email: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Action {
    #[serde(default)]
    id: Value,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    created_at: Option<String>,
    #[serde(default)]
    actor: Option<Actor>,
    #[serde(default)]
    change: Option<Change>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Actor {
    #[serde(rename = "type", default, deserialize_with = "lenient::opt_string")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Change {
    #[serde(rename = "type", default, deserialize_with = "lenient::opt_string")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    body: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    message_type: Option<String>,
    #[serde(default)]
    note: bool,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    cc: Vec<CarbonCopy>,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    attachments: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
struct CarbonCopy {
    #[serde(default)]
    id: Value,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Attachment {
    #[serde(default)]
    id: Value,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    url: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    file_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    file_type: Option<String>,
}

/// GrooveHQ ticket → conversation
pub struct GrooveHqAdapter;

impl Adapter for GrooveHqAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::NORMALIZE
    }

    fn normalize(&self, raw: Value) -> Result<Conversation, AdapterError> {
        let ticket: Ticket = decode(NAME, raw)?;

        let customer = ticket.customer.and_then(|envelope| envelope.customer);
        let user = match customer {
            Some(customer) => ConversationUser {
                name: full_name(customer.first_name.as_deref(), customer.last_name.as_deref()),
                email: customer.email,
                avatar: customer.avatar_url,
                ..Default::default()
            },
            None => ConversationUser::default(),
        };

        let mut segments = ticket.tags;
        segments.extend(ticket.kind);

        let state = state_from_actions(&ticket.actions, ticket.status.as_deref());

        let mut messages = Vec::new();
        let mut files = Vec::new();
        let mut cc_seen: Vec<String> = Vec::new();
        let mut participants = Vec::new();

        for action in ticket.actions {
            let Some(change) = action.change else { continue };
            if !change
                .kind
                .as_deref()
                .is_some_and(|kind| kind.eq_ignore_ascii_case("message"))
            {
                continue;
            }

            let actor = action.actor.unwrap_or_default();
            let from = sender(&actor);
            let author = MessageUser {
                name: actor.name.clone(),
                avatar: None,
            };
            let date = date_millis(action.created_at.as_deref());
            let origin = channel_origin(change.message_type.as_deref());

            let body = change.body.unwrap_or_default();
            let content = html::to_text(&body);
            let note = change.note.then(|| content.clone());

            messages.push(Message {
                note,
                origin: Some(origin.clone()),
                original: Some(OriginalContent {
                    content_type: Some("text/html".to_string()),
                    content: Some(body),
                }),
                fingerprint: lenient::value_to_i64(&action.id),
                user: Some(author.clone()),
                ..Message::text(from, date, content)
            });

            for cc in change.cc {
                let key = lenient::value_to_string(&cc.id)
                    .or_else(|| cc.email.clone())
                    .unwrap_or_default();
                if cc_seen.contains(&key) {
                    continue;
                }
                cc_seen.push(key);
                participants.extend(cc.email);
            }

            for attachment in change.attachments {
                let Some(url) = attachment.url else { continue };
                files.push(Message {
                    file: Some(FilePayload {
                        url,
                        name: attachment.file_name.unwrap_or_default(),
                        mime_type: attachment.file_type.unwrap_or_default(),
                    }),
                    text: None,
                    origin: Some(origin.clone()),
                    fingerprint: lenient::value_to_i64(&attachment.id),
                    user: Some(author.clone()),
                    ..Message::text(from, date, String::new())
                });
            }
        }
        messages.extend(files);

        let id = lenient::value_to_string(&ticket.number).or_else(|| lenient::value_to_string(&ticket.id));

        Ok(Conversation {
            id,
            user,
            subject: ticket.title,
            segments,
            participants,
            messages,
            state,
            ..Default::default()
        })
    }
}

fn sender(actor: &Actor) -> MessageFrom {
    match actor.kind.as_deref() {
        Some(kind) if kind.eq_ignore_ascii_case("customer") => MessageFrom::User,
        _ => MessageFrom::Operator,
    }
}

fn state_from_actions(actions: &[Action], status: Option<&str>) -> ConversationState {
    let last_is_state_change = actions
        .last()
        .and_then(|action| action.change.as_ref())
        .and_then(|change| change.kind.as_deref())
        .is_some_and(|kind| kind.eq_ignore_ascii_case("state"));

    if !last_is_state_change {
        return ConversationState::Unresolved;
    }

    super::map_state(
        status,
        &[
            ("unread", ConversationState::Pending),
            ("pending", ConversationState::Pending),
            ("opened", ConversationState::Unresolved),
            ("spam", ConversationState::Resolved),
            ("closed", ConversationState::Resolved),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageKind;
    use serde_json::json;

    fn ticket() -> Value {
        json!({
            "number": 42,
            "title": "Refund request",
            "status": "closed",
            "type": "email",
            "tags": ["refund"],
            "customer": { "customer": {
                "first_name": "Ada", "last_name": "Lovelace",
                "email": "ada@example.com", "avatar_url": "https://img.example.com/ada.png"
            }},
            "actions": [
                {
                    "id": "1001",
                    "created_at": "2021-03-01T10:00:00Z",
                    "actor": { "type": "Customer", "name": "Ada Lovelace" },
                    "change": {
                        "type": "message",
                        "message_type": "email",
                        "body": "<p>I want my <b>money</b> back</p>",
                        "cc": [
                            { "id": 7, "email": "cfo@example.com" },
                            { "id": 7, "email": "cfo@example.com" }
                        ],
                        "attachments": [
                            { "id": "55", "url": "https://files.example.com/receipt.pdf",
                              "file_name": "receipt.pdf", "file_type": "application/pdf" }
                        ]
                    }
                },
                {
                    "id": "1002",
                    "created_at": "2021-03-01T11:00:00Z",
                    "actor": { "type": "Agent", "name": "Bob" },
                    "change": { "type": "message", "message_type": "chat", "note": true, "body": "Check order" }
                },
                {
                    "id": "1003",
                    "created_at": "2021-03-01T12:00:00Z",
                    "change": { "type": "state" }
                }
            ]
        })
    }

    #[test]
    fn test_normalize_ticket() {
        let conversation = GrooveHqAdapter.normalize(ticket()).unwrap();

        assert_eq!(conversation.id.as_deref(), Some("42"));
        assert_eq!(conversation.user.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(conversation.subject.as_deref(), Some("Refund request"));
        assert_eq!(conversation.segments, vec!["refund", "email"]);
        assert_eq!(conversation.participants, vec!["cfo@example.com"]);
        assert_eq!(conversation.state, ConversationState::Resolved);
        assert_eq!(conversation.messages.len(), 3);

        let first = &conversation.messages[0];
        assert_eq!(first.from, MessageFrom::User);
        assert_eq!(first.text.as_deref(), Some("I want my money back"));
        assert_eq!(first.origin.as_deref(), Some("email"));
        assert_eq!(first.fingerprint, Some(1001));
        assert_eq!(
            first.original.as_ref().unwrap().content.as_deref(),
            Some("<p>I want my <b>money</b> back</p>")
        );

        let note = &conversation.messages[1];
        assert_eq!(note.kind(), MessageKind::Note);
        assert_eq!(note.note.as_deref(), Some("Check order"));
        assert_eq!(note.user.as_ref().unwrap().name.as_deref(), Some("Bob"));

        let file = &conversation.messages[2];
        assert_eq!(file.kind(), MessageKind::File);
        assert_eq!(file.fingerprint, Some(55));
        assert_eq!(file.file.as_ref().unwrap().name, "receipt.pdf");
    }

    #[test]
    fn test_status_ignored_unless_last_action_is_state_change() {
        let mut raw = ticket();
        raw["actions"].as_array_mut().unwrap().pop();

        let conversation = GrooveHqAdapter.normalize(raw).unwrap();
        assert_eq!(conversation.state, ConversationState::Unresolved);
    }
}
