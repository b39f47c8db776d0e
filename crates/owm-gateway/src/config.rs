//! Gateway configuration file.
//!
//! The same JSON document holds the operator settings and the role to
//! address map written back by the registry, so it is both loaded and saved.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "gateway-owm.json";

const DEFAULT_LANG: &str = "fr";
const DEFAULT_UNIT: &str = "C";
const DEFAULT_RATE_SECS: u64 = 300;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file {} not found, default written", .path.display())]
    Missing { path: PathBuf },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing required field(s): {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("`rate` must be at least 1 second")]
    InvalidRate,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// On-disk shape of the config file.
///
/// Every field is optional when reading so that a half-filled file still
/// parses; `validate` decides what is actually required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredConfig {
    /// Display language for weather strings
    #[serde(default)]
    pub lang: Option<String>,
    /// Unit system: "C", "F" or "K"
    #[serde(default)]
    pub unit: Option<String>,
    /// Poll interval in seconds
    #[serde(default)]
    pub rate: Option<u64>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Place name as understood by the provider (e.g. "Paris,FR")
    #[serde(default)]
    pub place: Option<String>,
    /// Role key -> device address
    #[serde(default)]
    pub devices: BTreeMap<String, String>,
    /// Zenoh router endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zenoh_endpoint: Option<String>,
}

impl StoredConfig {
    /// Document written on first run: defaults filled, required fields blank.
    pub fn template() -> Self {
        Self {
            lang: Some(DEFAULT_LANG.to_string()),
            unit: Some(DEFAULT_UNIT.to_string()),
            rate: Some(DEFAULT_RATE_SECS),
            api_key: Some(String::new()),
            place: Some(String::new()),
            devices: BTreeMap::new(),
            zenoh_endpoint: None,
        }
    }

    /// Check required fields and fill defaults for optional ones.
    pub fn validate(&self) -> Result<Settings> {
        let mut missing = Vec::new();
        let api_key = required(&self.api_key, "api_key", &mut missing);
        let place = required(&self.place, "place", &mut missing);
        if !missing.is_empty() {
            return Err(ConfigError::Validation(missing));
        }

        let rate = self.rate.unwrap_or(DEFAULT_RATE_SECS);
        if rate == 0 {
            return Err(ConfigError::InvalidRate);
        }

        Ok(Settings {
            lang: optional(&self.lang, DEFAULT_LANG),
            unit: optional(&self.unit, DEFAULT_UNIT),
            poll_interval: Duration::from_secs(rate),
            api_key,
            place,
            zenoh_endpoint: self.zenoh_endpoint.clone().filter(|e| !e.trim().is_empty()),
        })
    }
}

fn required(value: &Option<String>, name: &str, missing: &mut Vec<String>) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => {
            missing.push(name.to_string());
            String::new()
        }
    }
}

fn optional(value: &Option<String>, default: &str) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

/// Validated settings, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub lang: String,
    pub unit: String,
    pub poll_interval: Duration,
    pub api_key: String,
    pub place: String,
    pub zenoh_endpoint: Option<String>,
}

/// Config file bound to its path.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: StoredConfig,
}

impl ConfigStore {
    /// Load the config file.
    ///
    /// A missing file is replaced by `StoredConfig::template()` and reported
    /// as `ConfigError::Missing` so the operator can fill it in.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            let store = Self {
                path: path.clone(),
                config: StoredConfig::template(),
            };
            store.save()?;
            return Err(ConfigError::Missing { path });
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = Self::parse(&path, &content)?;
        Ok(Self { path, config })
    }

    fn parse(path: &Path, content: &str) -> Result<StoredConfig> {
        serde_json::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the whole document back to disk.
    pub fn save(&self) -> Result<()> {
        let io_err = |source| ConfigError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(&self.config).map_err(|source| {
            ConfigError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, content).map_err(io_err)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &StoredConfig {
        &self.config
    }

    /// Mutable role -> address map, handed to the address registry.
    pub fn devices_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.config.devices
    }
}
