//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! API base URL, which storage backend holds the session, and the last
//! email used to sign in.
//!
//! Configuration is stored at `~/.config/geotagger/config.json`. The
//! `GEOTAGGER_API_URL` environment variable overrides the stored URL.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::{FileStore, KeyringStore, MemoryStore, SessionStorage, UnavailableStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "geotagger";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "GEOTAGGER_API_URL";

/// Backend used when neither config nor environment name one
pub const DEFAULT_API_URL: &str = "http://localhost:8000/";

/// Where session state is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// JSON file in the user data directory.
    #[default]
    File,
    /// OS keychain.
    Keyring,
    /// Process memory only; nothing survives a restart.
    Memory,
}

impl std::str::FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(StorageKind::File),
            "keyring" => Ok(StorageKind::Keyring),
            "memory" => Ok(StorageKind::Memory),
            other => Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
        }
    }
}

impl StorageKind {
    /// Open the session storage for this backend. A missing data
    /// directory degrades to storage that persists nothing.
    pub fn open(&self) -> SessionStorage {
        match self {
            StorageKind::File => match FileStore::in_data_dir() {
                Some(store) => SessionStorage::new(store),
                None => {
                    warn!("No data directory available, session will not persist");
                    SessionStorage::new(UnavailableStore)
                }
            },
            StorageKind::Keyring => SessionStorage::new(KeyringStore::new()),
            StorageKind::Memory => SessionStorage::new(MemoryStore::new()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub storage: StorageKind,
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
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

    /// API URL by precedence: explicit override, environment, config, default.
    pub fn api_url(&self, override_url: Option<&str>) -> String {
        let env = std::env::var(API_URL_ENV).ok();
        Self::pick_api_url(override_url, env.as_deref(), self.api_base_url.as_deref())
    }

    fn pick_api_url(override_url: Option<&str>, env: Option<&str>, stored: Option<&str>) -> String {
        [override_url, env, stored]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|url| !url.is_empty())
            .unwrap_or(DEFAULT_API_URL)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_precedence() {
        assert_eq!(
            Config::pick_api_url(Some("http://cli/"), Some("http://env/"), Some("http://cfg/")),
            "http://cli/"
        );
        assert_eq!(Config::pick_api_url(None, Some("http://env/"), Some("http://cfg/")), "http://env/");
        assert_eq!(Config::pick_api_url(None, Some("  "), Some("http://cfg/")), "http://cfg/");
        assert_eq!(Config::pick_api_url(None, None, None), DEFAULT_API_URL);
    }

    #[test]
    fn test_config_round_trip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geotagger").join(CONFIG_FILE);

        let missing = Config::load_from(&path).unwrap();
        assert_eq!(missing.storage, StorageKind::File);
        assert!(missing.api_base_url.is_none());

        let config = Config {
            api_base_url: Some("https://api.example.com/".to_string()),
            storage: StorageKind::Keyring,
            last_email: Some("a@b.c".to_string()),
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.storage, StorageKind::Keyring);
        assert_eq!(loaded.last_email.as_deref(), Some("a@b.c"));
        assert!(std::fs::read_to_string(&path).unwrap().contains(r#""storage": "keyring""#));
    }

    #[test]
    fn test_storage_kind_parse_and_memory_open() {
        assert_eq!("Memory".parse::<StorageKind>().unwrap(), StorageKind::Memory);
        assert!("cloud".parse::<StorageKind>().is_err());
        assert!(StorageKind::Memory.open().is_available());
    }
}
