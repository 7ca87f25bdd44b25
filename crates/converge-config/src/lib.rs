//! Credential and endpoint resolution
//!
//! Each setting is taken from the first source that provides it:
//! 1. An explicit value (command-line flag)
//! 2. Environment variable (`HCLOUD_TOKEN`, `HCLOUD_ENDPOINT`)
//! 3. Config file (`CONVERGE_CONFIG` or `~/.config/converge/config.yaml`)
//! 4. Built-in default (endpoint only)

pub mod error;

pub use error::*;

use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_ENDPOINT: &str = "https://api.hetzner.cloud/v1";

pub const TOKEN_ENV: &str = "HCLOUD_TOKEN";
pub const ENDPOINT_ENV: &str = "HCLOUD_ENDPOINT";
pub const CONFIG_PATH_ENV: &str = "CONVERGE_CONFIG";

/// Resolved API credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_token: String,
    pub api_endpoint: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_token", &"<redacted>")
            .field("api_endpoint", &self.api_endpoint)
            .finish()
    }
}

/// Values supplied directly by the caller
#[derive(Debug, Clone, Default)]
pub struct CredentialSources {
    pub api_token: Option<String>,
    pub api_endpoint: Option<String>,
    pub config_path: Option<PathBuf>,
}

/// Contents of `config.yaml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub api_endpoint: Option<String>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("converge").join("config.yaml"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn env_value(key: &str) -> Option<String> {
    non_empty(std::env::var(key).ok())
}

/// Load the config file if one applies.
///
/// A path named explicitly (argument or `CONVERGE_CONFIG`) must exist;
/// the default location is optional.
fn load_config_file(explicit: Option<PathBuf>) -> Result<ConfigFile> {
    let explicit = explicit.or_else(|| env_value(CONFIG_PATH_ENV).map(PathBuf::from));

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path));
        }
        tracing::debug!("Loading config from {}", path.display());
        return ConfigFile::load(&path);
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            tracing::debug!("Loading config from {}", path.display());
            ConfigFile::load(&path)
        }
        _ => Ok(ConfigFile::default()),
    }
}

impl CredentialSources {
    pub fn resolve(self) -> Result<Credentials> {
        let explicit_token = non_empty(self.api_token).or_else(|| env_value(TOKEN_ENV));
        let explicit_endpoint = non_empty(self.api_endpoint).or_else(|| env_value(ENDPOINT_ENV));

        // The file is only consulted when something is still missing
        let file = if explicit_token.is_none() || explicit_endpoint.is_none() {
            load_config_file(self.config_path)?
        } else {
            ConfigFile::default()
        };

        let api_token = explicit_token
            .or_else(|| non_empty(file.api_token))
            .ok_or(ConfigError::MissingToken)?;
        let api_endpoint = explicit_endpoint
            .or_else(|| non_empty(file.api_endpoint))
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Ok(Credentials {
            api_token,
            api_endpoint,
        })
    }
}
