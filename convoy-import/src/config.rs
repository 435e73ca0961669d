//! Configuration resolution for convoy-import
//!
//! Every setting is resolved with priority CLI → environment → TOML →
//! built-in default. Credentials have no default: a missing website id,
//! plugin URN, identifier or key is a configuration error reported before
//! any I/O happens.

use crate::models::PlanLimits;
use crate::services::chat_client::{ChatClientConfig, DEFAULT_API_BASE_URL};
use crate::services::conversation_importer::{ImporterSettings, DEFAULT_MARKER_NAME, DEFAULT_TEMPORIZE};
use crate::services::message_sender::SendLimits;
use crate::services::pipeline::DEFAULT_BACKPRESSURE;
use crate::services::status_registry::DEFAULT_STATUS_PATH;
use convoy_common::config::TomlConfig;
use convoy_common::time::millis_to_duration;
use convoy_common::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

pub const ENV_WEBSITE_ID: &str = "CONVOY_WEBSITE_ID";
pub const ENV_PLUGIN_URN: &str = "CONVOY_PLUGIN_URN";
pub const ENV_IDENTIFIER: &str = "CONVOY_IDENTIFIER";
pub const ENV_KEY: &str = "CONVOY_KEY";
pub const ENV_WEBSITE_PLAN: &str = "CONVOY_WEBSITE_PLAN";

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub website_id: Option<String>,
    pub plugin_urn: Option<String>,
    pub identifier: Option<String>,
    pub key: Option<String>,
    pub website_plan: Option<String>,
    pub status_path: Option<PathBuf>,
    pub resume: bool,
}

/// Fully resolved import configuration
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub website_id: String,
    pub plugin_urn: String,
    pub identifier: String,
    pub key: String,
    pub plan: PlanLimits,
    pub default_email: Option<String>,
    pub default_nickname: Option<String>,
    pub operator_name: String,
    pub status_path: PathBuf,
    pub api_base_url: String,
    pub backpressure: Duration,
    pub temporize: Duration,
    pub resume: bool,
}

impl ImportConfig {
    /// Merge all tiers and validate
    pub fn resolve(toml_config: &TomlConfig, cli: &CliOverrides) -> Result<Self> {
        let section = &toml_config.import;

        let website_id = resolve_tier("website_id", &cli.website_id, ENV_WEBSITE_ID, &section.website_id);
        let plugin_urn = resolve_tier("plugin_urn", &cli.plugin_urn, ENV_PLUGIN_URN, &section.plugin_urn);
        let identifier = resolve_tier("identifier", &cli.identifier, ENV_IDENTIFIER, &section.identifier);
        let key = resolve_tier("key", &cli.key, ENV_KEY, &section.key);
        let website_plan =
            resolve_tier("website_plan", &cli.website_plan, ENV_WEBSITE_PLAN, &section.website_plan);

        let missing: Vec<&str> = [
            ("website_id", &website_id),
            ("plugin_urn", &plugin_urn),
            ("identifier", &identifier),
            ("key", &key),
        ]
        .iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| *name)
        .collect();

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Missing required configuration: {}. Set them using one of:\n\
                 1. Command line: --website-id, --plugin-urn, --identifier, --key\n\
                 2. Environment: {}, {}, {}, {}\n\
                 3. TOML config: [import] section (website_id, plugin_urn, identifier, key)",
                missing.join(", "),
                ENV_WEBSITE_ID,
                ENV_PLUGIN_URN,
                ENV_IDENTIFIER,
                ENV_KEY,
            )));
        }

        let api_base_url = section
            .api_base_url
            .clone()
            .filter(|url| is_set(url))
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "Invalid api_base_url {:?}: expected an http(s) URL",
                api_base_url
            )));
        }

        Ok(Self {
            website_id: website_id.unwrap_or_default(),
            plugin_urn: plugin_urn.unwrap_or_default(),
            identifier: identifier.unwrap_or_default(),
            key: key.unwrap_or_default(),
            plan: PlanLimits::for_plan(website_plan.as_deref()),
            default_email: section.default_email.clone().filter(|v| is_set(v)),
            default_nickname: section.default_nickname.clone().filter(|v| is_set(v)),
            operator_name: section
                .operator_name
                .clone()
                .filter(|v| is_set(v))
                .unwrap_or_else(|| DEFAULT_MARKER_NAME.to_string()),
            status_path: cli
                .status_path
                .clone()
                .or_else(|| section.status_path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATUS_PATH)),
            api_base_url,
            backpressure: section
                .backpressure_ms
                .map(millis_to_duration)
                .unwrap_or(DEFAULT_BACKPRESSURE),
            temporize: section
                .temporize_ms
                .map(millis_to_duration)
                .unwrap_or(DEFAULT_TEMPORIZE),
            resume: cli.resume,
        })
    }

    /// Connection settings for the HTTP client
    pub fn chat_client_config(&self) -> ChatClientConfig {
        ChatClientConfig {
            base_url: self.api_base_url.clone(),
            website_id: self.website_id.clone(),
            identifier: self.identifier.clone(),
            key: self.key.clone(),
        }
    }

    /// Importer knobs derived from this configuration
    pub fn importer_settings(&self) -> ImporterSettings {
        ImporterSettings {
            plugin_urn: self.plugin_urn.clone(),
            default_email: self.default_email.clone(),
            default_nickname: self.default_nickname.clone(),
            marker_name: self.operator_name.clone(),
            resume: self.resume,
            plan: self.plan,
            send_limits: SendLimits::default(),
            temporize: self.temporize,
        }
    }
}

/// Pick the first non-blank value among CLI, environment and TOML
fn resolve_tier(
    name: &str,
    cli: &Option<String>,
    env_var: &str,
    toml: &Option<String>,
) -> Option<String> {
    let env = std::env::var(env_var).ok();

    let candidates = [
        ("command line", cli.as_deref()),
        ("environment", env.as_deref()),
        ("TOML", toml.as_deref()),
    ];

    let present: Vec<&str> = candidates
        .iter()
        .filter(|(_, value)| value.is_some_and(is_set))
        .map(|(source, _)| *source)
        .collect();

    if present.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            name,
            present.join(", "),
            present[0]
        );
    }

    candidates
        .iter()
        .find_map(|(source, value)| {
            value.filter(|v| is_set(v)).map(|v| {
                debug!("{} loaded from {}", name, source);
                v.trim().to_string()
            })
        })
}

/// Non-empty, non-whitespace
pub fn is_set(value: &str) -> bool {
    !value.trim().is_empty()
}
