//! Token store configuration.
//!
//! Settings are read from `~/.config/eightctl/tokencache.json` (platform
//! config dir), then overridden by `EIGHTCTL_KEYRING_*` environment variables.
//! Every field is optional; a missing file means defaults.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::keyring::DEFAULT_SERVICE;
use crate::store::DEFAULT_FILE_PASSPHRASE;

/// Application name used for config paths
const APP_NAME: &str = "eightctl";

/// Config file name
const CONFIG_FILE: &str = "tokencache.json";

pub const ENV_BACKEND: &str = "EIGHTCTL_KEYRING_BACKEND";
pub const ENV_DIR: &str = "EIGHTCTL_KEYRING_DIR";
pub const ENV_PASSPHRASE: &str = "EIGHTCTL_KEYRING_PASSPHRASE";

/// Which secure store to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Native keyring when reachable, encrypted file otherwise
    #[default]
    Auto,
    Native,
    File,
}

impl std::str::FromStr for BackendPreference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(BackendPreference::Auto),
            "native" | "keyring" => Ok(BackendPreference::Native),
            "file" => Ok(BackendPreference::File),
            other => Err(anyhow::anyhow!(
                "Unknown keyring backend '{}' (expected auto, native or file)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub service: String,
    pub backend: BackendPreference,
    pub file_dir: Option<PathBuf>,
    pub file_passphrase: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE.to_string(),
            backend: BackendPreference::Auto,
            file_dir: None,
            file_passphrase: None,
        }
    }
}

impl StoreConfig {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Apply overrides from a variable lookup (the process environment in `load`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup(ENV_BACKEND) {
            self.backend = backend
                .parse()
                .with_context(|| format!("Invalid {}", ENV_BACKEND))?;
        }
        if let Some(dir) = lookup(ENV_DIR).filter(|d| !d.trim().is_empty()) {
            self.file_dir = Some(PathBuf::from(dir));
        }
        if let Some(passphrase) = lookup(ENV_PASSPHRASE).filter(|p| !p.is_empty()) {
            self.file_passphrase = Some(passphrase);
        }
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory of the encrypted file store, `~/.config/eightctl/keyring` by default.
    pub fn file_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.file_dir {
            return Ok(dir.clone());
        }
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        Ok(home.join(".config").join(APP_NAME).join("keyring"))
    }

    pub fn file_passphrase(&self) -> &str {
        self.file_passphrase
            .as_deref()
            .unwrap_or(DEFAULT_FILE_PASSPHRASE)
    }
}
