//! Help Scout conversations (Mailbox API v2 export, threads embedded)

use super::{channel_origin, date_millis, decode, full_name, map_state, Adapter, AdapterCapabilities, AdapterError};
use crate::models::lenient;
use crate::models::{
    Conversation, ConversationState, ConversationUser, Message, MessageFrom, MessageUser,
    OriginalContent,
};
use serde::Deserialize;
use serde_json::{Map, Value};

const NAME: &str = "helpscout";

const STATES: [(&str, ConversationState); 4] = [
    ("pending", ConversationState::Pending),
    ("active", ConversationState::Unresolved),
    ("open", ConversationState::Unresolved),
    ("closed", ConversationState::Resolved),
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HelpScoutConversation {
    #[serde(default)]
    id: Value,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    subject: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    status: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient::opt_string")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    tags: Vec<String>,
    #[serde(default)]
    primary_customer: Option<Person>,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    custom_fields: Vec<CustomField>,
    #[serde(rename = "_embedded", default)]
    embedded: Option<Embedded>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Person {
    #[serde(rename = "type", default, deserialize_with = "lenient::opt_string")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    first: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    last: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    email: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CustomField {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    name: Option<String>,
    #[serde(default)]
    text: Value,
}

#[derive(Debug, Deserialize)]
struct Embedded {
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    threads: Vec<Thread>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Thread {
    #[serde(default)]
    id: Value,
    #[serde(rename = "type", default, deserialize_with = "lenient::opt_string")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    body: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    created_at: Option<String>,
    #[serde(default)]
    created_by: Option<Person>,
    #[serde(default)]
    source: Option<Source>,
}

#[derive(Debug, Deserialize)]
struct Source {
    #[serde(rename = "type", default, deserialize_with = "lenient::opt_string")]
    kind: Option<String>,
}

/// Help Scout conversation → conversation
pub struct HelpScoutAdapter;

impl Adapter for HelpScoutAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::NORMALIZE
    }

    fn normalize(&self, raw: Value) -> Result<Conversation, AdapterError> {
        let conversation: HelpScoutConversation = decode(NAME, raw)?;

        let customer = conversation.primary_customer.unwrap_or_default();
        let user = ConversationUser {
            name: full_name(customer.first.as_deref(), customer.last.as_deref()),
            email: customer.email,
            avatar: customer.photo_url,
            ..Default::default()
        };

        let mut segments = conversation.tags;
        segments.extend(conversation.kind);

        let data: Map<String, Value> = conversation
            .custom_fields
            .into_iter()
            .filter_map(|field| Some((field.name?.replace(' ', "_"), field.text)))
            .collect();

        let threads = conversation.embedded.map(|e| e.threads).unwrap_or_default();
        let messages = threads.into_iter().map(thread_message).collect();

        Ok(Conversation {
            id: lenient::value_to_string(&conversation.id),
            user,
            subject: conversation.subject,
            segments,
            data,
            messages,
            state: map_state(conversation.status.as_deref(), &STATES),
            ..Default::default()
        })
    }
}

fn thread_message(thread: Thread) -> Message {
    let body = thread.body.unwrap_or_default();
    let content = body.replace("<br />", "\n").replace("<br>", "");

    let author = thread.created_by.unwrap_or_default();
    let from = match author.kind.as_deref() {
        Some("customer") => MessageFrom::User,
        _ => MessageFrom::Operator,
    };

    let is_note = thread.kind.as_deref() == Some("note");
    let origin = channel_origin(thread.source.and_then(|s| s.kind).as_deref());

    let original = OriginalContent {
        content_type: Some("text/html".to_string()),
        content: Some(content.clone()),
    };

    Message {
        note: is_note.then_some(body),
        origin: Some(origin),
        original: Some(original),
        fingerprint: lenient::value_to_i64(&thread.id),
        user: Some(MessageUser {
            name: full_name(author.first.as_deref(), author.last.as_deref()),
            avatar: author.photo_url,
        }),
        ..Message::text(from, date_millis(thread.created_at.as_deref()), content)
    }
}
