//! Vendor exports resolved by name and replayed end to end

mod helpers;

use convoy_import::models::{ConversationState, MessageFrom, MessageKind};
use convoy_import::services::chat_client::{MessageContent, Participant};
use convoy_import::services::Pipeline;
use convoy_import::{AdapterError, AdapterRegistry};
use helpers::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Import `records` through the adapter registered as `name`
async fn import_with(name: &str, records: Value) -> (Arc<MockChatApi>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let input = write_json(temp_dir.path(), "export.json", &records);

    let adapter = AdapterRegistry::with_builtin().resolve(name).unwrap();
    let api = Arc::new(MockChatApi::new());
    let importer = create_test_importer(api.clone(), &temp_dir, test_settings(), Some(adapter));
    let mut pipeline = Pipeline::new(importer, Duration::ZERO);

    let summary = pipeline.import_file(&input).await.unwrap();
    assert_eq!(summary.failed, 0, "failures: {:?}", summary.failures);

    (api, temp_dir)
}

#[test]
fn test_unknown_adapter_name() {
    let err = AdapterRegistry::with_builtin().resolve("intercom").err().unwrap();
    assert!(matches!(err, AdapterError::NotFound(_)));
    assert!(err.to_string().contains("intercom"));
}

#[test]
fn test_grouping_capabilities() {
    let registry = AdapterRegistry::with_builtin();

    for name in ["tidio", "gorgias"] {
        let capabilities = registry.resolve(name).unwrap().capabilities();
        assert!(capabilities.group && capabilities.normalize, "{}", name);
    }
    for name in ["zendesk", "groovehq", "helpscout", "whmcs"] {
        let capabilities = registry.resolve(name).unwrap().capabilities();
        assert!(!capabilities.group && capabilities.normalize, "{}", name);
    }
}

#[tokio::test]
async fn test_groovehq_ticket_replay() {
    let (api, temp_dir) = import_with(
        "groovehq",
        json!([{
            "number": 42,
            "title": "Refund request",
            "status": "closed",
            "customer": { "customer": { "first_name": "Ada", "last_name": "Lovelace", "email": "ada@example.com" } },
            "actions": [
                {
                    "id": "1001",
                    "created_at": "2021-03-01T10:00:00Z",
                    "actor": { "type": "Customer", "name": "Ada Lovelace" },
                    "change": {
                        "type": "message",
                        "message_type": "email",
                        "body": "<p>I want my <b>money</b> back</p>",
                        "cc": [{ "id": 7, "email": "cfo@example.com" }]
                    }
                },
                {
                    "id": "1002",
                    "created_at": "2021-03-01T11:00:00Z",
                    "actor": { "type": "Agent", "name": "Bob" },
                    "change": { "type": "message", "message_type": "chat", "note": true, "body": "Check order" }
                },
                { "id": "1003", "created_at": "2021-03-01T12:00:00Z", "change": { "type": "state" } }
            ]
        }]),
    )
    .await;

    let messages = api.messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[1].content, MessageContent::Text("I want my money back".to_string()));
    assert_eq!(messages[1].origin, "email");
    assert_eq!(messages[1].user.nickname.as_deref(), Some("Ada Lovelace"));
    assert_eq!(messages[2].kind, MessageKind::Note);
    assert_eq!(messages[2].user.nickname.as_deref(), Some("Bob"));

    assert_eq!(api.participants().unwrap(), vec![Participant::email("cfo@example.com")]);
    assert!(matches!(api.calls().last(), Some(Call::State(ConversationState::Resolved))));
    assert_eq!(read_status(&temp_dir).get("42"), Some(&json!(true)));
}

#[tokio::test]
async fn test_helpscout_conversation_replay() {
    let (api, temp_dir) = import_with(
        "helpscout",
        json!([{
            "id": 10,
            "subject": "Login issue",
            "status": "pending",
            "primaryCustomer": { "first": "Grace", "last": "Hopper", "email": "grace@example.com" },
            "customFields": [{ "name": "Order Number", "text": "A-77" }],
            "_embedded": { "threads": [{
                "id": 501,
                "type": "customer",
                "body": "Hi<br />I can't log in",
                "createdAt": "2022-05-01T08:00:00Z",
                "createdBy": { "type": "customer", "first": "Grace", "last": "Hopper" },
                "source": { "type": "email" }
            }]}
        }]),
    )
    .await;

    let meta = api
        .calls()
        .into_iter()
        .find_map(|call| match call {
            Call::Meta(meta) => Some(meta),
            _ => None,
        })
        .unwrap();
    assert_eq!(meta.nickname.as_deref(), Some("Grace Hopper"));
    assert_eq!(meta.data.unwrap().get("Order_Number"), Some(&json!("A-77")));

    let message = &api.messages()[1];
    assert_eq!(message.from, MessageFrom::User);
    assert_eq!(message.content.as_text(), Some("Hi\nI can't log in"));
    assert_eq!(message.fingerprint, Some(501));

    assert!(matches!(api.calls().last(), Some(Call::State(ConversationState::Pending))));
    assert_eq!(read_status(&temp_dir).get("10"), Some(&json!(true)));
}

#[tokio::test]
async fn test_whmcs_ticket_replay() {
    let (api, temp_dir) = import_with(
        "WHMCS",
        json!([{
            "id": "812",
            "name": "Linus",
            "email": "linus@example.com",
            "subject": "Server down",
            "status": "Closed",
            "replies": { "reply": { "replyid": "0", "email": "linus@example.com",
                                     "date": "2019-02-03 10:00:00", "message": "It is down" } },
            "notes": ""
        }]),
    )
    .await;

    let messages = api.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].from, MessageFrom::User);
    assert_eq!(messages[1].origin, "chat");
    assert_eq!(messages[1].timestamp, 1_549_188_000_000);
    assert_eq!(read_status(&temp_dir).get("812"), Some(&json!(true)));
}
