//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API base URL, the request timeout, where the session
//! is kept, and the last used username.
//!
//! Configuration is stored at `~/.config/hisab/config.json`. The
//! `HISAB_API_URL` and `HISAB_TIMEOUT_SECS` environment variables take
//! precedence over the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::{FileTokenStore, KeyringTokenStore, TokenStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "hisab";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend served by `manage.py runserver` on a development machine.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";

/// HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const API_URL_ENV: &str = "HISAB_API_URL";
pub const TIMEOUT_ENV: &str = "HISAB_TIMEOUT_SECS";

/// Where the session record lives between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// `session.json` in the data directory.
    #[default]
    File,
    /// The OS keychain.
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub storage: StorageBackend,
    pub last_username: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Per-user data directory; holds the session file.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn api_url(&self) -> String {
        self.resolve_api_url(std::env::var(API_URL_ENV).ok())
    }

    pub fn request_timeout(&self) -> Duration {
        self.resolve_timeout(std::env::var(TIMEOUT_ENV).ok())
    }

    fn resolve_api_url(&self, from_env: Option<String>) -> String {
        from_env
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    fn resolve_timeout(&self, from_env: Option<String>) -> Duration {
        let from_env = from_env.and_then(|raw| match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Some(secs),
            _ => {
                warn!(value = %raw, "Ignoring invalid {}", TIMEOUT_ENV);
                None
            }
        });
        let secs = from_env
            .or(self.request_timeout_secs.filter(|secs| *secs > 0))
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// The configured session store. Keychain entries are per system user.
    pub fn token_store(&self) -> Result<Box<dyn TokenStore>> {
        let store: Box<dyn TokenStore> = match self.storage {
            StorageBackend::File => Box::new(FileTokenStore::new(&self.data_dir()?)),
            StorageBackend::Keyring => Box::new(KeyringTokenStore::new(&keychain_account())?),
        };
        Ok(store)
    }
}

fn keychain_account() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "default".to_string())
}
