//! File-backed activation state: `active.toml` under the state directory.
//!
//! One table per active extension, carrying the version, the cache-flush
//! hint and the depends ranges. That is everything the resolver's installed
//! view needs, so a snapshot never has to read the package directories.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::installed::{InstalledPackage, InstalledPackageSet};
use crate::utils::fs::{atomic_write, ensure_dir};
use crate::version::{Version, VersionRange};

use super::PackageActivation;

/// On-disk record of one active extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ActiveRecord {
    version: Version,
    #[serde(default)]
    clear_cache_on_load: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    depends: BTreeMap<String, VersionRange>,
}

/// [`PackageActivation`] backed by a TOML file.
#[derive(Debug)]
pub struct FileActivationState {
    path: PathBuf,
    records: BTreeMap<String, ActiveRecord>,
}

impl FileActivationState {
    /// Load the activation state from `path`; missing file means nothing is
    /// active.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self { path, records: BTreeMap::new() });
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read activation state: {}", path.display()))?;
        let records = toml::from_str(&content)
            .with_context(|| format!("Failed to parse activation state: {}", path.display()))?;
        Ok(Self { path, records })
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        let content = toml::to_string_pretty(&self.records)
            .context("Failed to serialize activation state")?;
        atomic_write(&self.path, content.as_bytes()).with_context(|| {
            format!("Failed to write activation state: {}", self.path.display())
        })
    }
}

impl PackageActivation for FileActivationState {
    fn activate(&mut self, extension_key: &str, package: InstalledPackage) -> Result<()> {
        let depends = package
            .dependencies
            .iter()
            .filter(|e| e.is_depends())
            .map(|e| (e.target_key.clone(), e.range.clone()))
            .collect();
        self.records.insert(
            extension_key.to_string(),
            ActiveRecord {
                version: package.version,
                clear_cache_on_load: package.clear_cache_on_load,
                depends,
            },
        );
        self.save()?;
        debug!(extension_key, "Activation state saved");
        Ok(())
    }

    fn deactivate(&mut self, extension_key: &str) -> Result<()> {
        if self.records.remove(extension_key).is_some() {
            self.save()?;
            debug!(extension_key, "Removed from activation state");
        }
        Ok(())
    }

    fn is_active(&self, extension_key: &str) -> bool {
        self.records.contains_key(extension_key)
    }

    fn installed(&self) -> Result<InstalledPackageSet> {
        let mut set = InstalledPackageSet::new();
        for (key, record) in &self.records {
            let mut package = InstalledPackage::new(record.version)
                .with_clear_cache_on_load(record.clear_cache_on_load);
            package.dependencies = record
                .depends
                .iter()
                .map(|(target, range)| crate::catalog::ConstraintEdge {
                    kind: crate::catalog::ConstraintKind::Depends,
                    target_key: target.clone(),
                    range: range.clone(),
                })
                .collect();
            set.insert(key.clone(), package);
        }
        Ok(set)
    }
}
