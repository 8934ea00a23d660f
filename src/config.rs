//! Application configuration management.
//!
//! This module handles loading and saving the library's configuration:
//! the operator id that scopes the durable cache, and an optional API
//! base URL override for pointing at staging or self-hosted portals.
//! `ApiClient::from_config` consumes the override at construction time.
//!
//! Configuration is stored at `~/.config/bookcache/config.json`.

use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "bookcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub operator_id: Option<i64>,
    pub api_base_url: Option<String>,
}

impl Config {
    /// Load the saved configuration, falling back to defaults when no
    /// config file exists yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Cache directory for durable storage, scoped per operator so
    /// datasets never mix across identities.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;

        let mut path = cache_dir.join(APP_NAME);
        if let Some(operator_id) = self.operator_id {
            path = path.join(operator_id.to_string());
        }
        Ok(path)
    }
}
