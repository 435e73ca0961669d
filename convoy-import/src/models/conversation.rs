//! Canonical conversation model
//!
//! Every input record, with or without an adapter, ends up as a
//! [`Conversation`]. Values are built once per record and never mutated by
//! the importer.

use super::lenient;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One importable support thread
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Checkpoint key; only needed when resuming
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub user: ConversationUser,

    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub subject: Option<String>,

    /// Tag-like strings; empty values are dropped before submission
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub segments: Vec<String>,

    /// Custom field key → value
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub data: Map<String, Value>,

    /// Participant email addresses
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub participants: Vec<String>,

    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub messages: Vec<Message>,

    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub state: ConversationState,
}

/// Primary end user of a conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationUser {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub avatar: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub locales: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub country: Option<String>,
}

/// Remote conversation state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationState {
    Unresolved,
    Pending,
    #[default]
    Resolved,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Unresolved => "unresolved",
            ConversationState::Pending => "pending",
            ConversationState::Resolved => "resolved",
        }
    }
}

/// Message author role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFrom {
    User,
    #[default]
    Operator,
}

impl MessageFrom {
    /// Anything that is not exactly `user` is an operator
    pub fn parse(raw: &str) -> Self {
        if raw == "user" {
            MessageFrom::User
        } else {
            MessageFrom::Operator
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageFrom::User => "user",
            MessageFrom::Operator => "operator",
        }
    }
}

impl<'de> Deserialize<'de> for MessageFrom {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(s)) => MessageFrom::parse(&s),
            _ => MessageFrom::Operator,
        })
    }
}

/// Content kind derived from which payload fields are present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Note,
    File,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Note => "note",
            MessageKind::File => "file",
        }
    }
}

/// One message of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub from: MessageFrom,

    /// Epoch milliseconds
    #[serde(
        default = "convoy_common::time::now_millis",
        deserialize_with = "lenient::millis"
    )]
    pub date: i64,

    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub text: Option<String>,

    /// Private note content; makes this an operator-internal message
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub note: Option<String>,

    #[serde(default)]
    pub file: Option<FilePayload>,

    /// Channel tag, e.g. `chat` or `email`
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub origin: Option<String>,

    #[serde(default)]
    pub original: Option<OriginalContent>,

    /// Per-message de-duplication id; absent when the source has none
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub fingerprint: Option<i64>,

    /// Author override (CC'd participant, assignee, ...)
    #[serde(default)]
    pub user: Option<MessageUser>,
}

impl Message {
    /// Plain text message from `from` at `date`
    pub fn text(from: MessageFrom, date: i64, text: impl Into<String>) -> Self {
        Self {
            from,
            date,
            text: Some(text.into()),
            note: None,
            file: None,
            origin: None,
            original: None,
            fingerprint: None,
            user: None,
        }
    }

    /// Private operator note at `date`
    pub fn note(date: i64, note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            text: None,
            ..Self::text(MessageFrom::Operator, date, String::new())
        }
    }

    /// `file` wins over `note`, which wins over `text`
    pub fn kind(&self) -> MessageKind {
        if self.file.is_some() {
            MessageKind::File
        } else if self.note.as_deref().is_some_and(|n| !n.is_empty()) {
            MessageKind::Note
        } else {
            MessageKind::Text
        }
    }
}

/// Attachment payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePayload {
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub mime_type: String,
}

/// Raw rendition of a message kept next to its normalized text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalContent {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub content: Option<String>,
}

/// Author shown on a message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageUser {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub avatar: Option<String>,
}

impl From<&ConversationUser> for MessageUser {
    fn from(user: &ConversationUser) -> Self {
        Self {
            name: user.name.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_record_uses_defaults() {
        let conversation: Conversation = serde_json::from_value(json!({
            "messages": [{ "text": "hello", "date": 1000, "from": "user" }]
        }))
        .unwrap();

        assert_eq!(conversation.id, None);
        assert_eq!(conversation.state, ConversationState::Resolved);
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.messages[0].from, MessageFrom::User);
        assert_eq!(conversation.messages[0].kind(), MessageKind::Text);
    }

    #[test]
    fn test_unknown_sender_is_operator() {
        let message: Message =
            serde_json::from_value(json!({ "from": "agent", "text": "x", "date": 1 })).unwrap();
        assert_eq!(message.from, MessageFrom::Operator);

        let message: Message = serde_json::from_value(json!({ "text": "x", "date": 1 })).unwrap();
        assert_eq!(message.from, MessageFrom::Operator);
    }

    #[test]
    fn test_numeric_id_and_nulls_are_accepted() {
        let conversation: Conversation = serde_json::from_value(json!({
            "id": 12345,
            "user": null,
            "segments": ["vip", null, ""],
            "data": null,
            "state": "pending",
            "messages": [{ "text": "x", "date": "2020-01-01T00:00:00Z", "fingerprint": "77" }]
        }))
        .unwrap();

        assert_eq!(conversation.id.as_deref(), Some("12345"));
        assert_eq!(conversation.segments, vec!["vip".to_string(), String::new()]);
        assert!(conversation.data.is_empty());
        assert_eq!(conversation.state, ConversationState::Pending);
        assert_eq!(conversation.messages[0].date, 1_577_836_800_000);
        assert_eq!(conversation.messages[0].fingerprint, Some(77));
    }

    #[test]
    fn test_kind_precedence() {
        let mut message = Message::text(MessageFrom::Operator, 0, "body");
        assert_eq!(message.kind(), MessageKind::Text);

        message.note = Some("internal".to_string());
        assert_eq!(message.kind(), MessageKind::Note);

        message.file = Some(FilePayload {
            url: "https://files.example.com/a.png".to_string(),
            name: "a.png".to_string(),
            mime_type: "image/png".to_string(),
        });
        assert_eq!(message.kind(), MessageKind::File);
    }

    #[test]
    fn test_empty_note_does_not_make_a_note() {
        let message: Message =
            serde_json::from_value(json!({ "text": "x", "note": "", "date": 1 })).unwrap();
        assert_eq!(message.kind(), MessageKind::Text);
    }
}
