//! Execution ledger: the durable record of one-time setup steps.
//!
//! Entries are `(namespace, key) -> marker` where the marker is opaque to the
//! ledger ("1", or a content hash the caller compares against). Every `set`
//! rewrites the backing TOML file atomically, so a marker that was written is
//! visible to later lookups in this process and after a restart.
//!
//! The ledger exposes no delete. Callers treat keys as write-once and check
//! [`ExecutionLedger::get`] before doing the work the marker guards.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use crate::utils::fs::{atomic_write, ensure_dir};

/// Durable (namespace, key) to marker store backed by one TOML file.
#[derive(Debug)]
pub struct ExecutionLedger {
    path: PathBuf,
    entries: BTreeMap<String, BTreeMap<String, String>>,
}

impl ExecutionLedger {
    /// Load the ledger from `path`; a missing file is an empty ledger.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self { path, entries: BTreeMap::new() });
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read ledger file: {}", path.display()))?;
        let entries = toml::from_str(&content)
            .with_context(|| format!("Failed to parse ledger file: {}", path.display()))?;
        Ok(Self { path, entries })
    }

    /// The marker stored for `(namespace, key)`, if any.
    #[must_use]
    pub fn get(&self, namespace: &str, key: &str) -> Option<&str> {
        self.entries.get(namespace)?.get(key).map(String::as_str)
    }

    /// Whether any marker exists for `(namespace, key)`.
    #[must_use]
    pub fn is_marked(&self, namespace: &str, key: &str) -> bool {
        self.get(namespace, key).is_some()
    }

    /// Store a marker and persist it immediately.
    pub fn set(
        &mut self,
        namespace: &str,
        key: &str,
        marker: impl Into<String>,
    ) -> Result<()> {
        let marker = marker.into();
        debug!(namespace, key, marker = %marker, "Ledger marker written");
        self.entries
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), marker);
        self.save()
    }

    /// All keys marked under `namespace`, sorted.
    #[must_use]
    pub fn keys_in(&self, namespace: &str) -> Vec<String> {
        self.entries
            .get(namespace)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        let content =
            toml::to_string_pretty(&self.entries).context("Failed to serialize ledger")?;
        atomic_write(&self.path, content.as_bytes())
            .with_context(|| format!("Failed to write ledger file: {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let ledger = ExecutionLedger::load(temp.path().join("ledger.toml")).unwrap();
        assert!(ledger.get("extension-data-import", "news/seed/files").is_none());
        assert!(!ledger.is_marked("extension-data-import", "news/seed/files"));
    }

    #[test]
    fn test_set_then_get() {
        let temp = TempDir::new().unwrap();
        let mut ledger = ExecutionLedger::load(temp.path().join("ledger.toml")).unwrap();

        ledger.set("extension-data-import", "news/seed/files", "1").unwrap();
        assert_eq!(ledger.get("extension-data-import", "news/seed/files"), Some("1"));
        // Other namespaces are unaffected.
        assert!(ledger.get("site-config-import", "news/seed/files").is_none());
    }

    #[test]
    fn test_markers_survive_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ledger.toml");

        let mut ledger = ExecutionLedger::load(&path).unwrap();
        ledger.set("extension-data-import", "news/seed/static.sql", "abc123").unwrap();
        ledger.set("site-config-import", "main", "1").unwrap();
        drop(ledger);

        let reloaded = ExecutionLedger::load(&path).unwrap();
        assert_eq!(
            reloaded.get("extension-data-import", "news/seed/static.sql"),
            Some("abc123")
        );
        assert_eq!(reloaded.get("site-config-import", "main"), Some("1"));
    }

    #[test]
    fn test_each_set_is_durable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ledger.toml");

        let mut ledger = ExecutionLedger::load(&path).unwrap();
        ledger.set("extension-data-import", "news/seed/files", "1").unwrap();

        // A second instance loaded from disk sees the marker without any
        // explicit save call.
        let other = ExecutionLedger::load(&path).unwrap();
        assert!(other.is_marked("extension-data-import", "news/seed/files"));
    }

    #[test]
    fn test_keys_with_slashes_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ledger.toml");

        let mut ledger = ExecutionLedger::load(&path).unwrap();
        ledger.set("extension-data-import", "my_ext/seed/files", "1").unwrap();
        ledger.set("extension-data-import", "my_ext/seed/static.sql", "h").unwrap();

        let reloaded = ExecutionLedger::load(&path).unwrap();
        assert_eq!(
            reloaded.keys_in("extension-data-import"),
            vec!["my_ext/seed/files".to_string(), "my_ext/seed/static.sql".to_string()]
        );
    }

    #[test]
    fn test_parent_directory_created_on_save() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state").join("ledger.toml");

        let mut ledger = ExecutionLedger::load(&path).unwrap();
        ledger.set("site-config-import", "main", "1").unwrap();
        assert!(path.exists());
    }
}
