//! Configuration loading and management
//!
//! Handles parsing of `.tl/config.toml`. Every key is optional; a missing
//! file means all defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::log::MAX_RECORD_BYTES;

pub const CONFIG_FILE: &str = "config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Actor configuration
    #[serde(default)]
    pub actor: ActorConfig,

    /// Issue id generation
    #[serde(default)]
    pub ids: IdConfig,

    /// Event log limits
    #[serde(default)]
    pub log: LogConfig,
}

/// Actor-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Default actor name when none specified
    #[serde(default = "default_actor")]
    pub default: String,
}

fn default_actor() -> String {
    "unknown".to_string()
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            default: default_actor(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdConfig {
    #[serde(default = "default_id_prefix")]
    pub prefix: String,
    /// Shortest random suffix handed out
    #[serde(default = "default_id_min_len")]
    pub min_len: usize,
}

fn default_id_prefix() -> String {
    "tl".to_string()
}

fn default_id_min_len() -> usize {
    4
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            prefix: default_id_prefix(),
            min_len: default_id_min_len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,
}

fn default_max_record_bytes() -> usize {
    MAX_RECORD_BYTES
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_record_bytes: default_max_record_bytes(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `config.toml` from a store directory, or return defaults
    pub fn load_from_store(store_dir: &Path) -> Result<Self> {
        let config_path = store_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        crate::lock::write_atomic(path, content.as_bytes())
    }

    fn validate(&self) -> Result<()> {
        let prefix = self.ids.prefix.trim();
        if prefix.is_empty() {
            return Err(Error::InvalidConfig("ids.prefix cannot be empty".to_string()));
        }
        if !prefix.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(Error::InvalidConfig("ids.prefix must be alphanumeric".to_string()));
        }
        if self.ids.min_len < 3 {
            return Err(Error::InvalidConfig("ids.min_len must be >= 3".to_string()));
        }
        if self.ids.min_len > 16 {
            return Err(Error::InvalidConfig("ids.min_len must be <= 16".to_string()));
        }
        if self.log.max_record_bytes == 0 {
            return Err(Error::InvalidConfig(
                "log.max_record_bytes must be > 0".to_string(),
            ));
        }
        if self.actor.default.trim().is_empty() {
            return Err(Error::InvalidConfig("actor.default cannot be empty".to_string()));
        }
        Ok(())
    }
}
