//! Configuration management.
//!
//! The configuration names the auth service, picks the storage backend for
//! the credential and carries a few client preferences. It is stored at
//! `~/.config/authsession/config.json`; environment variables override the
//! file.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::api::http_client;
use crate::auth::{CredentialStore, FileStore, KeyValueStore, KeyringStore, SessionManager};

/// Application name used for config/data directory paths
const APP_NAME: &str = "authsession";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// HTTP request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_BASE_URL: &str = "AUTHSESSION_BASE_URL";
pub const ENV_STORAGE: &str = "AUTHSESSION_STORAGE";

/// Where the credential is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "keyring" | "keychain" => Ok(StorageBackend::Keyring),
            other => Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub storage: StorageBackend,
    pub request_timeout_secs: u64,
    pub last_email: Option<String>,
    /// Write logs here in addition to stderr
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            storage: StorageBackend::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            last_email: None,
            log_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
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

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(
            std::env::var(ENV_BASE_URL).ok(),
            std::env::var(ENV_STORAGE).ok(),
        )
    }

    fn apply_overrides(&mut self, base_url: Option<String>, storage: Option<String>) -> Result<()> {
        if let Some(base_url) = base_url.filter(|s| !s.trim().is_empty()) {
            self.base_url = base_url.trim().to_string();
        }
        if let Some(storage) = storage.filter(|s| !s.trim().is_empty()) {
            self.storage = storage.parse()?;
        }
        Ok(())
    }

    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).with_context(|| format!("Invalid base URL: {}", self.base_url))
    }

    /// Origin of the auth service (`scheme://host:port`); storage is scoped to it
    pub fn origin(&self) -> Result<String> {
        let url = self.base_url()?;
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(anyhow::anyhow!("Base URL has no origin: {}", self.base_url));
        }
        Ok(origin.ascii_serialization())
    }

    /// Data directory for this origin
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME).join(origin_dir_name(&self.origin()?)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn credential_store(&self) -> Result<CredentialStore> {
        let backend: Arc<dyn KeyValueStore> = match self.storage {
            StorageBackend::File => Arc::new(FileStore::new(self.data_dir()?)),
            StorageBackend::Keyring => Arc::new(KeyringStore::new(&self.origin()?)),
        };
        Ok(CredentialStore::new(backend))
    }

    /// Build a session for the configured service. It still needs `restore()`.
    pub fn build_session(&self) -> Result<SessionManager> {
        let client = http_client(self.request_timeout()).context("Failed to build HTTP client")?;
        Ok(SessionManager::new(
            client,
            self.base_url()?,
            self.credential_store()?,
        ))
    }
}

/// Turn an origin into a directory name: `http://localhost:8080` -> `http_localhost_8080`
fn origin_dir_name(origin: &str) -> String {
    origin
        .replace("://", "_")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}
