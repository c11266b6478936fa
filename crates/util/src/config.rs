//! Configuration for the `ttml` binary.
//!
//! A small JSON file holding the roll service location and execution
//! defaults. The file lives in the standard configuration directory
//! (`~/.config/ttml/config.json` on most platforms) unless `TTML_CONFIG_PATH`
//! points elsewhere. A missing file yields the defaults; a malformed one is
//! reported and replaced by the defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::expand_tilde;

/// Environment variable allowing callers to override the config file path.
pub const CONFIG_PATH_ENV: &str = "TTML_CONFIG_PATH";

/// Default filename for the JSON payload.
pub const CONFIG_FILE_NAME: &str = "config.json";

const DEFAULT_ROLL_API_BASE: &str = "https://roll.poweredvtt.com";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Error surfaced when reading or writing the config file fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persisted settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtmlConfig {
    /// Base URL of the roll service.
    pub roll_api_base: String,
    /// HTTP timeout for roll requests.
    pub request_timeout_secs: u64,
    /// Upper bound for each host callback; unset waits indefinitely.
    pub callback_timeout_secs: Option<u64>,
    /// Clear results, variables, and target after each run.
    pub cleanup: bool,
}

impl Default for TtmlConfig {
    fn default() -> Self {
        Self {
            roll_api_base: DEFAULT_ROLL_API_BASE.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            callback_timeout_secs: None,
            cleanup: true,
        }
    }
}

impl TtmlConfig {
    /// Load from [`default_config_path`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&default_config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(config) => Ok(config),
                Err(error) => {
                    warn!(
                        path = %path.display(),
                        error = %error,
                        "Failed to parse config file; using defaults"
                    );
                    Ok(Self::default())
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(ConfigError::Io(error)),
        }
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn callback_timeout(&self) -> Option<Duration> {
        self.callback_timeout_secs.map(Duration::from_secs)
    }
}

/// `TTML_CONFIG_PATH` when set, otherwise `<config_dir>/ttml/config.json`.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return expand_tilde(trimmed);
        }
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ttml")
        .join(CONFIG_FILE_NAME)
}
