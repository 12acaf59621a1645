use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::duration::deserialize_duration;

/// Default currency applied when the source payload carries none.
fn default_currency() -> String {
    "USD".to_string()
}

/// Default TTL for cached range queries (5 minutes).
fn default_range_ttl() -> std::time::Duration {
    std::time::Duration::from_secs(5 * 60)
}

/// Default TTL for the cached monthly overview (10 minutes).
fn default_monthly_ttl() -> std::time::Duration {
    std::time::Duration::from_secs(10 * 60)
}

/// Client cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a cached range query stays valid.
    #[serde(
        default = "default_range_ttl",
        deserialize_with = "deserialize_duration"
    )]
    pub range_ttl: std::time::Duration,

    /// How long the cached monthly overview stays valid.
    #[serde(
        default = "default_monthly_ttl",
        deserialize_with = "deserialize_duration"
    )]
    pub monthly_ttl: std::time::Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            range_ttl: default_range_ttl(),
            monthly_ttl: default_monthly_ttl(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the data directory. If relative, resolved from the config
    /// file's location. If not specified, defaults to the config file's
    /// directory.
    pub data_dir: Option<PathBuf>,

    /// Currency assumed for payloads without an ISO currency code.
    #[serde(default = "default_currency")]
    pub default_currency: String,

    /// When true, user-facing error messages include storage error detail.
    pub debug_errors: bool,

    /// Client cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            default_currency: default_currency(),
            debug_errors: false,
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if the file doesn't
    /// exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the data directory path.
    ///
    /// If `data_dir` is set and relative, it's resolved relative to
    /// `config_dir`. If `data_dir` is not set, returns `config_dir`.
    pub fn resolve_data_dir(&self, config_dir: &Path) -> PathBuf {
        match &self.data_dir {
            Some(data_dir) if data_dir.is_absolute() => data_dir.clone(),
            Some(data_dir) => config_dir.join(data_dir),
            None => config_dir.to_path_buf(),
        }
    }
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./tallybook.toml` if it exists in the current directory
/// 2. `~/.local/share/tallybook/tallybook.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("tallybook.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("tallybook").join("tallybook.toml");
    }

    local_config
}
