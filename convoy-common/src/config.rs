//! Bootstrap configuration loading and config file resolution
//!
//! The TOML file holds bootstrap concerns only: remote API credentials,
//! import defaults and logging. Values found here are the lowest-priority
//! tier; environment variables and command-line arguments override them.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CONVOY_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Import credentials and defaults
    #[serde(default)]
    pub import: ImportSection,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[import]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSection {
    pub website_id: Option<String>,
    pub plugin_urn: Option<String>,
    pub identifier: Option<String>,
    pub key: Option<String>,
    /// Subscription tier of the target website (basic, pro, unlimited)
    pub website_plan: Option<String>,
    pub default_email: Option<String>,
    pub default_nickname: Option<String>,
    /// Nickname used on the import start/end notes
    pub operator_name: Option<String>,
    pub status_path: Option<PathBuf>,
    pub api_base_url: Option<String>,
    /// Delay after each conversation (milliseconds)
    pub backpressure_ms: Option<u64>,
    /// Delay between read-marking and closing calls (milliseconds)
    pub temporize_ms: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Config file resolution, in priority order:
/// 1. Command-line argument
/// 2. `CONVOY_CONFIG` environment variable
/// 3. Platform config directory (`<config_dir>/convoy/config.toml`), if it exists
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path().filter(|path| path.exists())
}

/// Platform default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("convoy").join("config.toml"))
}

/// Load TOML config from an explicit path
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)?;
    Ok(config)
}

/// Load TOML config if one resolves, defaults otherwise
pub fn load_or_default(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading TOML config");
            load_toml_config(&path)
        }
        None => Ok(TomlConfig::default()),
    }
}

/// Replace `path` with `bytes` without ever exposing a half-written file
///
/// Writes `<path>.tmp`, syncs it, then renames over the target. Parent
/// directories are created when missing.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
