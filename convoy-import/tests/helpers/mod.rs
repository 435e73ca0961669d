//! Test Helper Utilities
//!
//! Shared utilities for testing convoy-import

#![allow(dead_code)]

pub mod mock_api;

pub use mock_api::{Call, Failures, MockChatApi};

use convoy_import::adapters::Adapter;
use convoy_import::services::{ConversationImporter, ImporterSettings, StatusRegistry};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const TEST_URN: &str = "urn:convoy:import:test";

/// Importer settings with all delays disabled
pub fn test_settings() -> ImporterSettings {
    let mut settings = ImporterSettings::new(TEST_URN);
    settings.temporize = Duration::ZERO;
    settings
}

/// Status file path inside `temp_dir`
pub fn status_path(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("res").join("status.json")
}

/// Importer over `api`, checkpointing into `temp_dir`
pub fn create_test_importer(
    api: Arc<MockChatApi>,
    temp_dir: &TempDir,
    settings: ImporterSettings,
    adapter: Option<Arc<dyn Adapter>>,
) -> ConversationImporter {
    let registry = StatusRegistry::load(&status_path(temp_dir)).unwrap();
    ConversationImporter::new(api, adapter, registry, settings)
}

/// Canonical conversation record with one message per `(from, date, text)`
pub fn conversation_record(id: &str, messages: &[(&str, i64, &str)]) -> Value {
    let messages: Vec<Value> = messages
        .iter()
        .map(|(from, date, text)| json!({ "from": from, "date": date, "text": text }))
        .collect();

    json!({
        "id": id,
        "user": { "name": "Jane Doe", "email": "jane@example.com" },
        "messages": messages
    })
}

/// Write `value` as JSON to `dir/name`
pub fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
    path
}

/// Read the status file back as a JSON object
pub fn read_status(temp_dir: &TempDir) -> serde_json::Map<String, Value> {
    let content = std::fs::read_to_string(status_path(temp_dir)).unwrap();
    serde_json::from_str(&content).unwrap()
}
