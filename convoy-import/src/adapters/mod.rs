//! Vendor export adapters
//!
//! An adapter turns one vendor's export records into canonical
//! [`Conversation`]s. Two capabilities exist:
//! - `group`: build conversation records from separate exports (run once
//!   per batch, before import)
//! - `normalize`: map one vendor record to a [`Conversation`]
//!
//! Adapters are resolved by name from the [`AdapterRegistry`] at startup.

pub mod gorgias;
pub mod groovehq;
pub mod helpscout;
pub mod html;
pub mod tidio;
pub mod whmcs;
pub mod zendesk;

use crate::models::{Conversation, ConversationState};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Adapter errors; all of them stop the run
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Adapter not found: {0}")]
    NotFound(String),

    #[error("Adapter {0} is invalid: it can neither group nor normalize conversations")]
    Invalid(String),

    #[error("Adapter {adapter} cannot {capability} conversations")]
    Unsupported {
        adapter: String,
        capability: &'static str,
    },

    #[error("Adapter {adapter} failed: {reason}")]
    Failed { adapter: String, reason: String },
}

impl AdapterError {
    pub fn failed(adapter: &str, reason: impl Into<String>) -> Self {
        AdapterError::Failed {
            adapter: adapter.to_string(),
            reason: reason.into(),
        }
    }
}

/// What an adapter can do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterCapabilities {
    pub group: bool,
    pub normalize: bool,
}

impl AdapterCapabilities {
    pub const NORMALIZE: Self = Self {
        group: false,
        normalize: true,
    };

    pub const GROUP_AND_NORMALIZE: Self = Self {
        group: true,
        normalize: true,
    };

    pub fn is_empty(&self) -> bool {
        !self.group && !self.normalize
    }
}

/// Vendor-specific record transform
///
/// Both operations are pure. The defaults report the capability as
/// unsupported.
pub trait Adapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> AdapterCapabilities;

    /// Build conversation records from a conversations export and a
    /// messages export
    fn group_conversations(
        &self,
        _conversations: Vec<Value>,
        _messages: Vec<Value>,
    ) -> Result<Vec<Value>, AdapterError> {
        Err(AdapterError::Unsupported {
            adapter: self.name().to_string(),
            capability: "group",
        })
    }

    fn normalize(&self, _raw: Value) -> Result<Conversation, AdapterError> {
        Err(AdapterError::Unsupported {
            adapter: self.name().to_string(),
            capability: "normalize",
        })
    }
}

/// Name → adapter lookup
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in vendor adapter
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(zendesk::ZendeskAdapter));
        registry.register(Arc::new(groovehq::GrooveHqAdapter));
        registry.register(Arc::new(helpscout::HelpScoutAdapter));
        registry.register(Arc::new(tidio::TidioAdapter));
        registry.register(Arc::new(whmcs::WhmcsAdapter));
        registry.register(Arc::new(gorgias::GorgiasAdapter));
        registry
    }

    /// Add `adapter`, replacing any adapter of the same name
    pub fn register(&mut self, adapter: Arc<dyn Adapter>) {
        self.adapters.insert(adapter.name().to_lowercase(), adapter);
    }

    /// Case-insensitive lookup
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Adapter>, AdapterError> {
        let adapter = self
            .adapters
            .get(&name.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| AdapterError::NotFound(name.to_string()))?;

        if adapter.capabilities().is_empty() {
            return Err(AdapterError::Invalid(adapter.name().to_string()));
        }

        tracing::debug!(adapter = adapter.name(), "Resolved adapter");
        Ok(adapter)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.adapters.values().map(|a| a.name()).collect();
        names.sort_unstable();
        names
    }
}

// ============================================================================
// Helpers shared by the vendor adapters
// ============================================================================

/// Deserialize a vendor record, reporting failures against `adapter`
pub(crate) fn decode<T: DeserializeOwned>(adapter: &str, raw: Value) -> Result<T, AdapterError> {
    serde_json::from_value(raw)
        .map_err(|e| AdapterError::failed(adapter, format!("unexpected record shape: {}", e)))
}

/// "First Last" from optional halves
pub(crate) fn full_name(first: Option<&str>, last: Option<&str>) -> Option<String> {
    let name = [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!name.is_empty()).then_some(name)
}

/// Vendor date string → epoch millis, now when unparseable
pub(crate) fn date_millis(input: Option<&str>) -> i64 {
    input
        .and_then(crate::models::lenient::parse_date_millis)
        .unwrap_or_else(convoy_common::time::now_millis)
}

/// Origin tag: `email` for e-mail channels, `chat` otherwise
pub(crate) fn channel_origin(channel: Option<&str>) -> String {
    match channel {
        Some(c) if c.eq_ignore_ascii_case("email") => "email".to_string(),
        _ => "chat".to_string(),
    }
}

/// Map a vendor status through `table`; anything else is unresolved
pub(crate) fn map_state(status: Option<&str>, table: &[(&str, ConversationState)]) -> ConversationState {
    status
        .map(str::to_lowercase)
        .and_then(|status| {
            table
                .iter()
                .find(|(name, _)| *name == status)
                .map(|(_, state)| *state)
        })
        .unwrap_or(ConversationState::Unresolved)
}
