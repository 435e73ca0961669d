//! Target chat platform API client
//!
//! The importer talks to the remote platform through the [`ChatApi`] trait;
//! [`HttpChatClient`] is the production implementation over the REST API.
//!
//! Endpoints (relative to the base URL):
//! - `POST  /website/{website}/conversation`                    create, returns `session_id`
//! - `PATCH /website/{website}/conversation/{session}/meta`
//! - `PUT   /website/{website}/conversation/{session}/participants`
//! - `POST  /website/{website}/conversation/{session}/message`
//! - `PATCH /website/{website}/conversation/{session}/read`
//! - `PATCH /website/{website}/conversation/{session}/state`

use crate::models::{ConversationState, FilePayload, MessageFrom, MessageKind, OriginalContent};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str = "https://api.crisp.chat/v1";
const USER_AGENT: &str = concat!("convoy-import/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;
const PLUGIN_TIER: &str = "plugin";

/// Chat API errors
#[derive(Debug, Error)]
pub enum ChatApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

// ============================================================================
// Payloads
// ============================================================================

/// Conversation metadata update
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversationMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

/// Device sub-object of the metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locales: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<Geolocation>,
}

impl DeviceMeta {
    pub fn is_empty(&self) -> bool {
        self.locales.is_none() && self.geolocation.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Geolocation {
    pub country: String,
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Conversation participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    #[serde(rename = "type")]
    pub kind: String,
    pub target: String,
}

impl Participant {
    pub fn email(target: impl Into<String>) -> Self {
        Self {
            kind: "email".to_string(),
            target: target.into(),
        }
    }
}

/// Message body: text for text/note kinds, a file payload otherwise
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    File(FilePayload),
}

impl MessageContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::File(_) => None,
        }
    }
}

/// Author block of an outbound message
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MessageAuthor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Message as sent to the platform
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: MessageContent,
    pub from: MessageFrom,
    pub origin: String,
    pub user: MessageAuthor,
    /// Suppress outbound notifications (e-mail) to the end user
    pub stealth: bool,
    /// Epoch milliseconds
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<OriginalContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<i64>,
}

// ============================================================================
// Trait
// ============================================================================

/// Remote operations consumed by the importer
///
/// All calls may fail; the importer decides which failures are fatal to a
/// conversation.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Open a new conversation, returning its session identifier
    async fn create_conversation(&self) -> Result<String, ChatApiError>;

    async fn update_meta(&self, session_id: &str, meta: &ConversationMeta) -> Result<(), ChatApiError>;

    async fn save_participants(
        &self,
        session_id: &str,
        participants: &[Participant],
    ) -> Result<(), ChatApiError>;

    async fn send_message(&self, session_id: &str, message: &OutboundMessage) -> Result<(), ChatApiError>;

    /// Mark every message sent by `from` on channel `origin` as read
    async fn mark_read(&self, session_id: &str, from: MessageFrom, origin: &str) -> Result<(), ChatApiError>;

    async fn change_state(&self, session_id: &str, state: ConversationState) -> Result<(), ChatApiError>;
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// Connection settings for [`HttpChatClient`]
#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    pub base_url: String,
    pub website_id: String,
    pub identifier: String,
    pub key: String,
}

/// Response envelope shared by all endpoints
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    reason: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CreatedConversation {
    session_id: String,
}

/// REST client for the chat platform
pub struct HttpChatClient {
    http_client: reqwest::Client,
    base_url: String,
    website_id: String,
    identifier: String,
    key: String,
}

impl HttpChatClient {
    pub fn new(config: ChatClientConfig) -> Result<Self, ChatApiError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ChatApiError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            website_id: config.website_id,
            identifier: config.identifier,
            key: config.key,
        })
    }

    fn conversation_url(&self, session_id: Option<&str>, resource: Option<&str>) -> String {
        let mut url = format!("{}/website/{}/conversation", self.base_url, self.website_id);
        if let Some(session_id) = session_id {
            url.push('/');
            url.push_str(session_id);
        }
        if let Some(resource) = resource {
            url.push('/');
            url.push_str(resource);
        }
        url
    }

    /// Send an authenticated request and return the raw body of a 2xx response
    async fn execute(
        &self,
        method: reqwest::Method,
        url: String,
        body: Option<Value>,
    ) -> Result<String, ChatApiError> {
        tracing::trace!(method = %method, url = %url, "Chat API request");

        let mut request = self
            .http_client
            .request(method, &url)
            .basic_auth(&self.identifier, Some(&self.key))
            .header("X-Crisp-Tier", PLUGIN_TIER);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ChatApiError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ChatApiError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(ChatApiError::Api(status.as_u16(), text));
        }

        Ok(text)
    }

    /// Like `execute`, then decode the envelope and reject `error: true`
    async fn execute_json<T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: String,
        body: Option<Value>,
    ) -> Result<Option<T>, ChatApiError> {
        let text = self.execute(method, url, body).await?;
        if text.trim().is_empty() {
            return Ok(None);
        }

        decode_envelope(&text)
    }

    /// Write to a conversation sub-resource, ignoring the response data
    async fn write(&self, session_id: &str, resource: &str, body: Value) -> Result<(), ChatApiError> {
        let url = self.conversation_url(Some(session_id), Some(resource));
        self.execute_json::<Value>(resource_method(resource), url, Some(body))
            .await
            .map(|_| ())
    }
}

/// Participants are saved as a whole list; every other sub-resource is patched
fn resource_method(resource: &str) -> reqwest::Method {
    match resource {
        "participants" => reqwest::Method::PUT,
        "message" => reqwest::Method::POST,
        _ => reqwest::Method::PATCH,
    }
}

/// Decode a response envelope, rejecting `error: true`
fn decode_envelope<T: serde::de::DeserializeOwned>(text: &str) -> Result<Option<T>, ChatApiError> {
    let envelope: Envelope<T> =
        serde_json::from_str(text).map_err(|e| ChatApiError::Parse(e.to_string()))?;

    if envelope.error {
        return Err(ChatApiError::Api(200, envelope.reason));
    }
    Ok(envelope.data)
}

#[async_trait]
impl ChatApi for HttpChatClient {
    async fn create_conversation(&self) -> Result<String, ChatApiError> {
        let url = self.conversation_url(None, None);
        let created: Option<CreatedConversation> =
            self.execute_json(reqwest::Method::POST, url, None).await?;

        created
            .map(|c| c.session_id)
            .ok_or_else(|| ChatApiError::Parse("Missing session_id in response".to_string()))
    }

    async fn update_meta(&self, session_id: &str, meta: &ConversationMeta) -> Result<(), ChatApiError> {
        let body = serde_json::to_value(meta).map_err(|e| ChatApiError::Parse(e.to_string()))?;
        self.write(session_id, "meta", body).await
    }

    async fn save_participants(
        &self,
        session_id: &str,
        participants: &[Participant],
    ) -> Result<(), ChatApiError> {
        self.write(session_id, "participants", json!({ "participants": participants }))
            .await
    }

    async fn send_message(&self, session_id: &str, message: &OutboundMessage) -> Result<(), ChatApiError> {
        let body = serde_json::to_value(message).map_err(|e| ChatApiError::Parse(e.to_string()))?;
        self.write(session_id, "message", body).await
    }

    async fn mark_read(&self, session_id: &str, from: MessageFrom, origin: &str) -> Result<(), ChatApiError> {
        self.write(session_id, "read", json!({ "from": from, "origin": origin }))
            .await
    }

    async fn change_state(&self, session_id: &str, state: ConversationState) -> Result<(), ChatApiError> {
        self.write(session_id, "state", json!({ "state": state })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpChatClient {
        HttpChatClient::new(ChatClientConfig {
            base_url: "https://api.example.com/v1/".to_string(),
            website_id: "site-1".to_string(),
            identifier: "id".to_string(),
            key: "key".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_conversation_urls() {
        let client = client();
        assert_eq!(
            client.conversation_url(None, None),
            "https://api.example.com/v1/website/site-1/conversation"
        );
        assert_eq!(
            client.conversation_url(Some("session_abc"), Some("meta")),
            "https://api.example.com/v1/website/site-1/conversation/session_abc/meta"
        );
    }

    #[test]
    fn test_meta_omits_empty_fields() {
        let meta = ConversationMeta {
            email: Some("jane@example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&meta).unwrap(),
            json!({ "email": "jane@example.com" })
        );
    }

    #[test]
    fn test_outbound_message_wire_shape() {
        let message = OutboundMessage {
            kind: MessageKind::Text,
            content: MessageContent::Text("hello".to_string()),
            from: MessageFrom::Operator,
            origin: "chat".to_string(),
            user: MessageAuthor {
                nickname: Some("Agent".to_string()),
                avatar: None,
            },
            stealth: true,
            timestamp: 1000,
            original: None,
            fingerprint: Some(42),
        };

        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "type": "text",
                "content": "hello",
                "from": "operator",
                "origin": "chat",
                "user": { "nickname": "Agent" },
                "stealth": true,
                "timestamp": 1000,
                "fingerprint": 42
            })
        );
    }

    #[test]
    fn test_envelope_without_data() {
        let created: Option<CreatedConversation> =
            decode_envelope(r#"{ "error": false, "reason": "added" }"#).unwrap();
        assert!(created.is_none());

        let created: Option<CreatedConversation> = decode_envelope(
            r#"{ "error": false, "reason": "added", "data": { "session_id": "session_1" } }"#,
        )
        .unwrap();
        assert_eq!(created.unwrap().session_id, "session_1");
    }

    #[test]
    fn test_envelope_error_flag() {
        let err = decode_envelope::<Value>(r#"{ "error": true, "reason": "invalid_session" }"#)
            .unwrap_err();
        assert!(matches!(err, ChatApiError::Api(200, reason) if reason == "invalid_session"));
    }

    #[test]
    fn test_resource_methods() {
        assert_eq!(resource_method("participants"), reqwest::Method::PUT);
        assert_eq!(resource_method("message"), reqwest::Method::POST);
        assert_eq!(resource_method("meta"), reqwest::Method::PATCH);
        assert_eq!(resource_method("read"), reqwest::Method::PATCH);
        assert_eq!(resource_method("state"), reqwest::Method::PATCH);
    }

    #[test]
    fn test_participant_shape() {
        assert_eq!(
            serde_json::to_value(Participant::email("a@example.com")).unwrap(),
            json!({ "type": "email", "target": "a@example.com" })
        );
    }
}
