//! Plugin configuration, loaded once from TOML and immutable afterwards.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

pub mod defaults;

use defaults::*;

/// Process-wide plugin configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub basic: BasicConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicConfig {
    #[serde(default = "default_enable")]
    pub enable: bool,
}

/// Avatar cache retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Freshness window for avatars with a metadata sidecar
    #[serde(default = "default_real_avatar_ttl")]
    pub real_avatar_ttl_secs: u64,
    /// Freshness window for avatars lacking a metadata sidecar
    #[serde(default = "default_default_avatar_ttl")]
    pub default_avatar_ttl_secs: u64,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_hours: u64,
    /// Entries below this use count are eligible for scheduled cleanup
    #[serde(default = "default_cleanup_use_threshold")]
    pub cleanup_use_threshold: u64,
    /// Entries older than this many days are eligible for scheduled cleanup
    #[serde(default = "default_cleanup_expire_days")]
    pub cleanup_expire_days: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Locally configured admin identities, merged with the host's global list
    #[serde(default)]
    pub admin_users: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Trigger phrases that list the available memes
    #[serde(default = "default_list_commands")]
    pub list_commands: Vec<String>,
}

fn default_enable() -> bool {
    true
}

fn default_real_avatar_ttl() -> u64 {
    DEFAULT_REAL_AVATAR_TTL_SECS
}

fn default_default_avatar_ttl() -> u64 {
    DEFAULT_DEFAULT_AVATAR_TTL_SECS
}

fn default_cleanup_interval() -> u64 {
    DEFAULT_CLEANUP_INTERVAL_HOURS
}

fn default_cleanup_use_threshold() -> u64 {
    DEFAULT_CLEANUP_USE_THRESHOLD
}

fn default_cleanup_expire_days() -> u64 {
    DEFAULT_CLEANUP_EXPIRE_DAYS
}

fn default_list_commands() -> Vec<String> {
    vec![DEFAULT_LIST_COMMAND.to_string()]
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            enable: default_enable(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            real_avatar_ttl_secs: default_real_avatar_ttl(),
            default_avatar_ttl_secs: default_default_avatar_ttl(),
            cleanup_interval_hours: default_cleanup_interval(),
            cleanup_use_threshold: default_cleanup_use_threshold(),
            cleanup_expire_days: default_cleanup_expire_days(),
        }
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            list_commands: default_list_commands(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        Ok(config)
    }
}

impl CacheConfig {
    pub fn real_avatar_ttl(&self) -> Duration {
        Duration::from_secs(self.real_avatar_ttl_secs)
    }

    pub fn default_avatar_ttl(&self) -> Duration {
        Duration::from_secs(self.default_avatar_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_hours * 60 * 60)
    }

    pub fn cleanup_expire_age(&self) -> Duration {
        Duration::from_secs(self.cleanup_expire_days * 86_400)
    }
}
