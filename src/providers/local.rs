//! Directory-backed provider implementations.
//!
//! These stand in for the CMS-side services when the engine runs against a
//! plain directory tree: caches are group subdirectories, schema updates and
//! seed imports are recorded under the state directory so an operator can
//! inspect what a real host would have applied.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::utils::fs::{atomic_write, ensure_dir};

use super::{CacheService, SchemaService, SeedImporter};

/// [`CacheService`] over a cache directory with one subdirectory per group.
#[derive(Debug)]
pub struct DirCacheService {
    cache_dir: PathBuf,
}

impl DirCacheService {
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self { cache_dir: cache_dir.into() }
    }
}

impl CacheService for DirCacheService {
    fn flush_all(&self) -> Result<()> {
        if self.cache_dir.exists() {
            std::fs::remove_dir_all(&self.cache_dir).with_context(|| {
                format!("Failed to clear cache directory: {}", self.cache_dir.display())
            })?;
        }
        ensure_dir(&self.cache_dir)?;
        info!("All caches flushed");
        Ok(())
    }

    fn flush_group(&self, group: &str) -> Result<()> {
        let group_dir = self.cache_dir.join(group);
        if group_dir.exists() {
            std::fs::remove_dir_all(&group_dir).with_context(|| {
                format!("Failed to clear cache group: {}", group_dir.display())
            })?;
        }
        info!(group, "Cache group flushed");
        Ok(())
    }
}

/// [`SchemaService`] that appends one line per update to a log file.
#[derive(Debug)]
pub struct RecordingSchemaService {
    log_path: PathBuf,
}

impl RecordingSchemaService {
    #[must_use]
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self { log_path: log_path.into() }
    }
}

impl SchemaService for RecordingSchemaService {
    fn update_schema(&self) -> Result<()> {
        if let Some(parent) = self.log_path.parent() {
            ensure_dir(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| {
                format!("Failed to open schema log: {}", self.log_path.display())
            })?;
        writeln!(file, "schema updated at {}", chrono::Utc::now().to_rfc3339())
            .context("Failed to write schema log")?;
        debug!(log = %self.log_path.display(), "Schema update recorded");
        Ok(())
    }
}

/// [`SeedImporter`] that materializes imports under a directory.
///
/// Static SQL lands as `<key>.sql`, record imports as `<key>.records.toml`.
#[derive(Debug)]
pub struct RecordingSeedImporter {
    dir: PathBuf,
}

impl RecordingSeedImporter {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SeedImporter for RecordingSeedImporter {
    fn import_static_sql(&self, extension_key: &str, sql: &str) -> Result<()> {
        ensure_dir(&self.dir)?;
        let path = self.dir.join(format!("{extension_key}.sql"));
        atomic_write(&path, sql.as_bytes())
            .with_context(|| format!("Failed to record static SQL: {}", path.display()))?;
        info!(extension_key, "Static SQL recorded");
        Ok(())
    }

    fn import_records(&self, extension_key: &str, content: &str) -> Result<()> {
        ensure_dir(&self.dir)?;
        let path = self.dir.join(format!("{extension_key}.records.toml"));
        atomic_write(&path, content.as_bytes())
            .with_context(|| format!("Failed to record import data: {}", path.display()))?;
        info!(extension_key, "Record import recorded");
        Ok(())
    }
}
