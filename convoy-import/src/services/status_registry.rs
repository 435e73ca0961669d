//! Checkpoint store
//!
//! Durable map of conversation identifier → imported flag, persisted as a
//! pretty-printed JSON object. The file is read once at startup (created as
//! `{}` when absent) and rewritten wholesale after every conversation, via
//! temp file + rename so a crash never leaves it half-written.
//!
//! Keys are only ever added or overwritten.

use convoy_common::config::write_atomic;
use convoy_common::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default location, relative to the working directory
pub const DEFAULT_STATUS_PATH: &str = "./res/status.json";

/// Persisted import status per conversation
#[derive(Debug)]
pub struct StatusRegistry {
    path: PathBuf,
    entries: BTreeMap<String, bool>,
}

impl StatusRegistry {
    /// Load the registry at `path`, creating an empty one if missing
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "Creating empty status file");
            write_atomic(path, b"{}")?;
        }

        let content = std::fs::read_to_string(path)?;
        let entries: BTreeMap<String, bool> = serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Status file {} is not a JSON object of booleans: {}",
                path.display(),
                e
            ))
        })?;

        let imported = entries.values().filter(|v| **v).count();
        tracing::info!(
            path = %path.display(),
            entries = entries.len(),
            imported,
            "Loaded status file"
        );

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Whether `id` was recorded as imported
    pub fn is_imported(&self, id: &str) -> bool {
        self.entries.get(id).copied().unwrap_or(false)
    }

    /// Last recorded outcome for `id`
    pub fn get(&self, id: &str) -> Option<bool> {
        self.entries.get(id).copied()
    }

    /// Record the outcome for `id` and persist immediately
    pub fn record(&mut self, id: &str, imported: bool) -> Result<()> {
        self.entries.insert(id.to_string(), imported);
        self.persist()
    }

    /// Rewrite the whole file
    pub fn persist(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.entries)?;
        write_atomic(&self.path, &json)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
