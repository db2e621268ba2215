//! Configuration for the extman engine and CLI.
//!
//! One TOML file under the extman root directory controls where managed
//! state lives, which mirror serves package archives, and the installation
//! policy. Everything has a default, so a missing file is a valid
//! configuration.
//!
//! # File location
//!
//! `~/.extman/config.toml`, overridable per invocation with `--config` or
//! the `EXTMAN_CONFIG_PATH` environment variable.
//!
//! # File format
//!
//! ```toml
//! root_dir = "/srv/extman"
//! mirror_url = "https://mirror.example.org/packages"
//! download_timeout_secs = 60
//! lock_timeout_secs = 120
//! automatic_installation = true
//!
//! # Offline mode: read archives from a directory in mirror layout instead
//! # local_mirror = "/srv/mirror"
//! ```
//!
//! # Directory layout under `root_dir`
//!
//! - `extensions/<key>/` unpacked packages
//! - `assets/<key>/` seed files copied on first install
//! - `config/sites/<id>/` imported site configurations
//! - `cache/<group>/` cache groups
//! - `state/` catalog, ledger, activation state, locks, recorded imports

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::constants::{default_download_timeout, default_lock_timeout};
use crate::core::ExtmanError;
use crate::fetch::Fetcher;
use crate::utils::fs::safe_write;

fn default_root() -> PathBuf {
    dirs::home_dir().map_or_else(|| PathBuf::from(".extman"), |home| home.join(".extman"))
}

fn default_download_timeout_secs() -> u64 {
    default_download_timeout().as_secs()
}

fn default_lock_timeout_secs() -> u64 {
    default_lock_timeout().as_secs()
}

const fn default_true() -> bool {
    true
}

/// Engine configuration, loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of all managed directories
    pub root_dir: PathBuf,
    /// Base URL of the archive mirror
    pub mirror_url: String,
    /// Directory in mirror layout used instead of HTTP; enables offline mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_mirror: Option<PathBuf>,
    /// Per-request download timeout
    pub download_timeout_secs: u64,
    /// How long to wait for the per-extension operation lock
    pub lock_timeout_secs: u64,
    /// When false, install requests fetch and unpack only; no activation, no
    /// setup
    pub automatic_installation: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: default_root(),
            mirror_url: String::new(),
            local_mirror: None,
            download_timeout_secs: default_download_timeout_secs(),
            lock_timeout_secs: default_lock_timeout_secs(),
            automatic_installation: default_true(),
        }
    }
}

impl Config {
    /// The default configuration file path, `~/.extman/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
        Ok(home.join(".extman").join("config.toml"))
    }

    /// Load from `path` when given, otherwise from the default location.
    /// A missing file yields the default configuration.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(p) => p,
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Save as pretty TOML through the crate's atomic write; parent
    /// directories are created as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        safe_write(path, &content)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Unpacked package directories.
    #[must_use]
    pub fn extensions_dir(&self) -> PathBuf {
        self.root_dir.join("extensions")
    }

    /// Seed file assets, one subdirectory per extension key.
    #[must_use]
    pub fn assets_dir(&self) -> PathBuf {
        self.root_dir.join("assets")
    }

    /// Imported site configurations, one subdirectory per site identifier.
    #[must_use]
    pub fn sites_dir(&self) -> PathBuf {
        self.root_dir.join("config").join("sites")
    }

    /// Cache groups.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.root_dir.join("cache")
    }

    /// Engine state: catalog, ledger, activation, locks.
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.root_dir.join("state")
    }

    #[must_use]
    pub fn catalog_path(&self) -> PathBuf {
        self.state_dir().join("catalog.toml")
    }

    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.state_dir().join("ledger.toml")
    }

    #[must_use]
    pub fn activation_path(&self) -> PathBuf {
        self.state_dir().join("active.toml")
    }

    /// Recorded seed imports of the directory-backed providers.
    #[must_use]
    pub fn seeds_record_dir(&self) -> PathBuf {
        self.state_dir().join("seeds")
    }

    #[must_use]
    pub fn schema_log_path(&self) -> PathBuf {
        self.state_dir().join("schema.log")
    }

    #[must_use]
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    /// Build the archive fetcher this configuration describes.
    ///
    /// A local mirror wins over the HTTP mirror; with neither configured
    /// there is nowhere to fetch from.
    pub fn fetcher(&self) -> Result<Fetcher> {
        if let Some(dir) = &self.local_mirror {
            return Ok(Fetcher::local_mirror(dir));
        }
        if self.mirror_url.is_empty() {
            return Err(ExtmanError::ConfigError {
                message: "no mirror configured: set mirror_url or local_mirror".to_string(),
            }
            .into());
        }
        Fetcher::http(&self.mirror_url, self.download_timeout())
    }
}
