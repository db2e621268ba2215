//! Package catalog: the queryable index of all known extension versions.
//!
//! The catalog is populated by an external synchronization step — here a
//! snapshot import — and read by the resolver. Entries are keyed by
//! `(extension_key, version)` and grouped per key. Each key's version list
//! lives behind a sharded concurrent map: an upsert holds the key's shard
//! write lock while it rewrites the list and re-elects the current flag, so a
//! concurrent query never observes a half-updated key.
//!
//! # Current flag election
//!
//! After every insert touching a key, the catalog clears the key's current
//! flags and marks exactly one version: the highest (by packed integer
//! version) among entries whose state ranks stable-or-better, falling back to
//! the overall highest when none qualify. Ties on the integer — which the
//! version model rules out for distinct versions — resolve toward the most
//! recently imported entry.
//!
//! # Persistence
//!
//! The whole catalog round-trips through a TOML file written atomically, and
//! bulk imports read a JSON snapshot (the hand-off artifact of the remote
//! sync step, whose wire format is out of scope here).

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::fs::atomic_write;
use crate::utils::key::validate_extension_key;
use crate::version::{Version, VersionRange};

mod entry;

pub use entry::{ConstraintEdge, ConstraintKind, ExtensionState, ExtensionVersion};

/// In-memory catalog of extension versions with per-key atomic updates.
#[derive(Debug, Default)]
pub struct Catalog {
    /// Per-key version lists, sorted ascending by
    /// `(integer_version, upload_timestamp, import_seq)`.
    entries: DashMap<String, Vec<ExtensionVersion>>,
    /// Monotonic stamp for import-order tie-breaks.
    import_counter: AtomicU64,
}

/// Serialized catalog layout: a flat list of rows.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "extension")]
    extensions: Vec<ExtensionVersion>,
}

impl Catalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-insert versions, replacing rows with the same `(key, version)`
    /// identity and recomputing the current flag of every touched key.
    ///
    /// Entries with an invalid extension key are rejected and fail the whole
    /// call; constraint ranges are already validated by construction. Returns
    /// the number of rows inserted or replaced.
    pub fn upsert_versions(&self, entries: Vec<ExtensionVersion>) -> Result<usize> {
        let mut grouped: BTreeMap<String, Vec<ExtensionVersion>> = BTreeMap::new();
        for mut entry in entries {
            validate_extension_key(&entry.extension_key)?;
            entry.integer_version = entry.version.to_integer();
            entry.import_seq = self.import_counter.fetch_add(1, Ordering::Relaxed);
            grouped.entry(entry.extension_key.clone()).or_default().push(entry);
        }

        let mut inserted = 0;
        for (key, new_entries) in grouped {
            let mut slot = self.entries.entry(key.clone()).or_default();
            for entry in new_entries {
                slot.retain(|existing| existing.version != entry.version);
                slot.push(entry);
                inserted += 1;
            }
            slot.sort_by_key(|e| (e.integer_version, e.upload_timestamp, e.import_seq));
            Self::recompute_current(&mut slot);
            debug!(extension_key = %key, versions = slot.len(), "Catalog key updated");
        }

        Ok(inserted)
    }

    /// Re-elect the current flag for one key's sorted version list.
    fn recompute_current(versions: &mut [ExtensionVersion]) {
        for v in versions.iter_mut() {
            v.current = false;
        }
        // Lists are sorted ascending, so the last qualifying element is the
        // highest version with the latest-import tie-break built in.
        let chosen = versions
            .iter()
            .rposition(|v| v.state.is_stable_or_better())
            .or_else(|| versions.len().checked_sub(1));
        if let Some(index) = chosen {
            versions[index].current = true;
        }
    }

    /// Look up an exact `(key, version)` row.
    #[must_use]
    pub fn find_version(&self, extension_key: &str, version: &Version) -> Option<ExtensionVersion> {
        self.entries
            .get(extension_key)?
            .iter()
            .find(|e| e.version == *version)
            .cloned()
    }

    /// Highest version of `extension_key` inside `range`.
    ///
    /// Walks the key's list from the top, so an integer-version tie prefers
    /// the most recently imported row.
    #[must_use]
    pub fn find_highest_satisfying(
        &self,
        extension_key: &str,
        range: &VersionRange,
    ) -> Option<ExtensionVersion> {
        self.entries
            .get(extension_key)?
            .iter()
            .rev()
            .find(|e| range.contains(&e.version))
            .cloned()
    }

    /// All versions of `extension_key` with packed integer strictly above
    /// `floor_exclusive` and at most `ceiling_inclusive` (0 = unbounded),
    /// ascending.
    ///
    /// This is the upgrade-path query: "everything newer than the installed
    /// version", with the ceiling used by callers that cap candidate ranges.
    #[must_use]
    pub fn find_versions_in_range(
        &self,
        extension_key: &str,
        floor_exclusive: u64,
        ceiling_inclusive: u64,
    ) -> Vec<ExtensionVersion> {
        match self.entries.get(extension_key) {
            None => Vec::new(),
            Some(slot) => slot
                .iter()
                .filter(|e| {
                    e.integer_version > floor_exclusive
                        && (ceiling_inclusive == 0 || e.integer_version <= ceiling_inclusive)
                })
                .cloned()
                .collect(),
        }
    }

    /// The version currently flagged current for `extension_key`.
    #[must_use]
    pub fn current(&self, extension_key: &str) -> Option<ExtensionVersion> {
        self.entries
            .get(extension_key)?
            .iter()
            .find(|e| e.current)
            .cloned()
    }

    /// All versions of `extension_key`, ascending.
    #[must_use]
    pub fn versions_of(&self, extension_key: &str) -> Vec<ExtensionVersion> {
        self.entries
            .get(extension_key)
            .map(|slot| slot.value().clone())
            .unwrap_or_default()
    }

    /// All known extension keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Total number of rows across all keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().map(|e| e.value().len()).sum()
    }

    /// Whether the catalog holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load a catalog from its TOML file; a missing file yields an empty
    /// catalog.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
        let file: CatalogFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse catalog file: {}", path.display()))?;

        let catalog = Self::new();
        catalog.upsert_versions(file.extensions)?;
        Ok(catalog)
    }

    /// Persist the catalog as TOML via an atomic write.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut extensions: Vec<ExtensionVersion> = self
            .entries
            .iter()
            .flat_map(|slot| slot.value().clone())
            .collect();
        extensions.sort_by(|a, b| {
            (&a.extension_key, a.integer_version).cmp(&(&b.extension_key, b.integer_version))
        });

        let file = CatalogFile { extensions };
        let content = toml::to_string_pretty(&file)
            .context("Failed to serialize catalog")?;
        atomic_write(path, content.as_bytes())
            .with_context(|| format!("Failed to write catalog file: {}", path.display()))
    }

    /// Import a JSON snapshot produced by the external catalog sync and
    /// upsert its rows. Returns the number of rows imported.
    pub fn import_snapshot(&self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog snapshot: {}", path.display()))?;
        let entries: Vec<ExtensionVersion> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog snapshot: {}", path.display()))?;

        let count = self.upsert_versions(entries)?;
        debug!(rows = count, snapshot = %path.display(), "Catalog snapshot imported");
        Ok(count)
    }
}
