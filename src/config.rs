//! Configuration loading for ModInfo+
//!
//! Settings are layered with figment: built-in defaults, then the global
//! `config.toml`, then an explicit file passed on the command line, then
//! `MODINFO_`-prefixed environment variables (nested keys use `__`, e.g.
//! `MODINFO_CACHE__STATS_TTL_SECS=60`).

use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::notifications::DEFAULT_MAX_RETAINED;
use crate::refresh::REFRESH_COOLDOWN_SECS;

/// Application name used for XDG directories
pub const APP_NAME: &str = "modinfo-plus";

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One of the layered sources could not be read or extracted
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// An explicitly requested config file does not exist
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Overrides the directory used by the persistent store
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Upstream API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Topic marker every discovered repository must carry
    pub topic: String,
    pub min_stars: u32,
    pub per_page: u32,
    pub user_agent: String,
    pub accept: String,
    pub discovery_timeout_secs: u64,
    pub stats_timeout_secs: u64,
    /// Name of the environment variable holding the bearer token
    pub token_env: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.github.com".to_string(),
            topic: "mindustry-mod".to_string(),
            min_stars: 1,
            per_page: 100,
            user_agent: "ModInfoPlus".to_string(),
            accept: "application/vnd.github+json".to_string(),
            discovery_timeout_secs: 10,
            stats_timeout_secs: 8,
            token_env: "GITHUB_TOKEN".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    pub fn stats_timeout(&self) -> Duration {
        Duration::from_secs(self.stats_timeout_secs)
    }

    /// Reads the bearer token from the configured environment variable
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

/// Freshness windows and refresh policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub discovery_ttl_secs: u64,
    pub stats_ttl_secs: u64,
    /// Minimum time between user-triggered full invalidations
    pub refresh_cooldown_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            discovery_ttl_secs: 15 * 60,
            stats_ttl_secs: 5 * 60,
            refresh_cooldown_secs: REFRESH_COOLDOWN_SECS,
        }
    }
}

impl CacheConfig {
    pub fn discovery_ttl(&self) -> Duration {
        Duration::from_secs(self.discovery_ttl_secs)
    }

    pub fn stats_ttl(&self) -> Duration {
        Duration::from_secs(self.stats_ttl_secs)
    }

    pub fn refresh_cooldown(&self) -> Duration {
        Duration::from_secs(self.refresh_cooldown_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Oldest entries are evicted beyond this count
    pub max_retained: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_retained: DEFAULT_MAX_RETAINED,
        }
    }
}

/// Returns the global configuration file path, if a home directory exists
pub fn global_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from every layered source
///
/// # Arguments
/// * `explicit` - Optional config file given on the command line; it must exist
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    if let Some(global) = global_config_path().filter(|p| p.exists()) {
        figment = figment.merge(Toml::file(global));
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("MODINFO_").split("__"));

    figment.extract().map_err(|e| ConfigError::Load(Box::new(e)))
}
