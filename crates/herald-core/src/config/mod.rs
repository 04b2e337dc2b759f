//! Configuration loading and validation.
//!
//! JSON5 format with camelCase keys. Config location: `~/.herald/herald.json`,
//! overridable via `HERALD_CONFIG`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::types::{ChannelId, RoleId};

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Channel watched for messages to relay.
    pub source_channel_id: ChannelId,

    /// Channel announcements are published into.
    pub announce_channel_id: ChannelId,

    /// Role required to activate the Announce control.
    pub allowed_role_id: RoleId,

    /// Seconds before an unresolved prompt's controls auto-disable.
    /// `null` means the prompt never expires.
    #[serde(default = "default_prompt_timeout")]
    pub prompt_timeout_secs: Option<u64>,

    /// Log file path. Defaults to `logs.txt` in the working directory.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

const fn default_prompt_timeout() -> Option<u64> {
    // The original announcement flow gave moderators five minutes.
    Some(300)
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or validated.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(&Self::default_path())
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses `HERALD_CONFIG` if set, otherwise `~/.herald/herald.json`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("HERALD_CONFIG") {
            PathBuf::from(path)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".herald").join("herald.json")
        } else {
            PathBuf::from("herald.json")
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns error if any identifier is empty or the source and
    /// announcement channels are the same.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_channel_id.as_ref().is_empty() {
            return Err(ConfigError::Validation(
                "sourceChannelId cannot be empty".to_string(),
            ));
        }
        if self.announce_channel_id.as_ref().is_empty() {
            return Err(ConfigError::Validation(
                "announceChannelId cannot be empty".to_string(),
            ));
        }
        if self.allowed_role_id.as_ref().is_empty() {
            return Err(ConfigError::Validation(
                "allowedRoleId cannot be empty".to_string(),
            ));
        }
        if self.source_channel_id == self.announce_channel_id {
            return Err(ConfigError::Validation(
                "sourceChannelId and announceChannelId must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// The prompt deadline, or `None` when prompts never expire.
    ///
    /// A configured value of `0` is treated the same as `null`.
    #[must_use]
    pub fn prompt_deadline(&self) -> Option<Duration> {
        self.prompt_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// The log file path, defaulting to `logs.txt`.
    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("logs.txt"))
    }
}
