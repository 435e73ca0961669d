//! Zendesk tickets (JSON export with embedded comments)

use super::{channel_origin, date_millis, decode, map_state, Adapter, AdapterCapabilities, AdapterError};
use crate::models::lenient;
use crate::models::{
    Conversation, ConversationState, ConversationUser, Message, MessageFrom, OriginalContent,
};
use serde::Deserialize;
use serde_json::Value;

const NAME: &str = "zendesk";

const STATES: [(&str, ConversationState); 4] = [
    ("pending", ConversationState::Pending),
    ("open", ConversationState::Unresolved),
    ("solved", ConversationState::Resolved),
    ("closed", ConversationState::Resolved),
];

#[derive(Debug, Deserialize)]
struct Ticket {
    #[serde(default)]
    id: Value,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    subject: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    status: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    requester: Requester,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    comments: Vec<Comment>,
}

#[derive(Debug, Default, Deserialize)]
struct Requester {
    #[serde(default)]
    id: Value,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    email: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    locale: Option<String>,
    #[serde(default)]
    photo: Option<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    content_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Comment {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    author_id: Value,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    body: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    html_body: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    created_at: Option<String>,
    #[serde(default)]
    via: Option<Via>,
}

#[derive(Debug, Deserialize)]
struct Via {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    channel: Option<String>,
}

/// Zendesk ticket → conversation
pub struct ZendeskAdapter;

impl Adapter for ZendeskAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::NORMALIZE
    }

    fn normalize(&self, raw: Value) -> Result<Conversation, AdapterError> {
        let ticket: Ticket = decode(NAME, raw)?;
        let requester = ticket.requester;
        let requester_id = lenient::value_to_string(&requester.id);

        let messages = ticket
            .comments
            .into_iter()
            .map(|comment| {
                let author_id = lenient::value_to_string(&comment.author_id);
                let from = if author_id.is_some() && author_id == requester_id {
                    MessageFrom::User
                } else {
                    MessageFrom::Operator
                };
                let channel = comment.via.and_then(|via| via.channel);
                let by_email = channel.as_deref() == Some("email");

                Message {
                    origin: Some(channel_origin(channel.as_deref())),
                    original: by_email.then(|| OriginalContent {
                        content_type: Some("text/html".to_string()),
                        content: comment.html_body,
                    }),
                    fingerprint: lenient::value_to_i64(&comment.id),
                    ..Message::text(
                        from,
                        date_millis(comment.created_at.as_deref()),
                        comment.body.unwrap_or_default(),
                    )
                }
            })
            .collect();

        Ok(Conversation {
            id: lenient::value_to_string(&ticket.id),
            user: ConversationUser {
                name: requester.name,
                email: requester.email,
                phone: requester.phone,
                avatar: requester.photo.and_then(|photo| photo.content_url),
                locales: requester.locale.into_iter().collect(),
                country: None,
            },
            subject: ticket.subject.map(|s| s.replace(['\r', '\n'], " ")),
            segments: ticket.tags,
            messages,
            state: map_state(ticket.status.as_deref(), &STATES),
            ..Default::default()
        })
    }
}
