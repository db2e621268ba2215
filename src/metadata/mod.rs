//! Package metadata: the `extension.toml` file inside each installed package.
//!
//! The file carries the author-facing description of a package (title,
//! description, author fields), the installed version and state, the
//! cache-flush hint, and the declared constraints. Archives usually ship one;
//! the orchestrator overlays it with catalog-derived values after unpacking.
//!
//! # Merge rule
//!
//! [`write_patch`] merges a sparse patch into whatever file exists on disk:
//! keys present in the patch win, keys absent keep their on-disk value, and
//! tables merge recursively. So a shipped file's title and author survive an
//! update while version, state and constraints follow the catalog.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use toml::Value;

use crate::catalog::{ConstraintEdge, ExtensionState, ExtensionVersion};
use crate::constants::METADATA_FILE;
use crate::utils::fs::atomic_write;
use crate::version::{Version, VersionRange};

/// Declared constraints, each a map of extension key to range string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub depends: BTreeMap<String, VersionRange>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub conflicts: BTreeMap<String, VersionRange>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub suggests: BTreeMap<String, VersionRange>,
}

impl Constraints {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.depends.is_empty() && self.conflicts.is_empty() && self.suggests.is_empty()
    }

    /// Flatten into constraint edges, depends first.
    #[must_use]
    pub fn edges(&self) -> Vec<ConstraintEdge> {
        let mut edges = Vec::new();
        for (key, range) in &self.depends {
            edges.push(ConstraintEdge {
                kind: crate::catalog::ConstraintKind::Depends,
                target_key: key.clone(),
                range: range.clone(),
            });
        }
        for (key, range) in &self.conflicts {
            edges.push(ConstraintEdge {
                kind: crate::catalog::ConstraintKind::Conflicts,
                target_key: key.clone(),
                range: range.clone(),
            });
        }
        for (key, range) in &self.suggests {
            edges.push(ConstraintEdge {
                kind: crate::catalog::ConstraintKind::Suggests,
                target_key: key.clone(),
                range: range.clone(),
            });
        }
        edges
    }
}

/// Contents of one package's `extension.toml`.
///
/// All fields are optional on disk; absent ones take their defaults. The
/// constraint tables stay last so TOML serialization emits the scalar fields
/// first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionMetadata {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub category: String,
    pub state: ExtensionState,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub author_email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub author_company: String,
    /// Whether activating or updating this package needs a full cache flush.
    /// Skipped when false so a catalog-derived patch cannot clobber the
    /// shipped hint.
    #[serde(skip_serializing_if = "is_false")]
    pub clear_cache_on_load: bool,
    #[serde(skip_serializing_if = "Constraints::is_empty")]
    pub constraints: Constraints,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ExtensionMetadata {
    /// Metadata derived from a catalog row; descriptive fields stay empty.
    #[must_use]
    pub fn from_catalog_entry(entry: &ExtensionVersion) -> Self {
        let mut constraints = Constraints::default();
        for edge in &entry.dependencies {
            let slot = match edge.kind {
                crate::catalog::ConstraintKind::Depends => &mut constraints.depends,
                crate::catalog::ConstraintKind::Conflicts => &mut constraints.conflicts,
                crate::catalog::ConstraintKind::Suggests => &mut constraints.suggests,
            };
            slot.insert(edge.target_key.clone(), edge.range.clone());
        }

        Self {
            version: Some(entry.version),
            category: entry.category.clone(),
            state: entry.state,
            constraints,
            ..Self::default()
        }
    }
}

/// Read a package directory's metadata file; absent file is `None`.
pub fn read(package_dir: &Path) -> Result<Option<ExtensionMetadata>> {
    let path = package_dir.join(METADATA_FILE);
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read metadata file: {}", path.display()))?;
    let metadata = toml::from_str(&content)
        .with_context(|| format!("Failed to parse metadata file: {}", path.display()))?;
    Ok(Some(metadata))
}

/// Overwrite a package directory's metadata file.
pub fn write(package_dir: &Path, metadata: &ExtensionMetadata) -> Result<()> {
    let path = package_dir.join(METADATA_FILE);
    let content = toml::to_string_pretty(metadata).context("Failed to serialize metadata")?;
    atomic_write(&path, content.as_bytes())
        .with_context(|| format!("Failed to write metadata file: {}", path.display()))
}

/// Merge `patch` into the on-disk metadata file and persist the result.
///
/// Patch keys win, on-disk keys absent from the patch survive, tables merge
/// recursively. With no existing file the patch is written as-is.
pub fn write_patch(package_dir: &Path, patch: &ExtensionMetadata) -> Result<()> {
    let path = package_dir.join(METADATA_FILE);

    let patch_value =
        Value::try_from(patch).context("Failed to convert metadata patch to TOML")?;
    let merged = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read metadata file: {}", path.display()))?;
        let mut existing: Value = toml::from_str(&content)
            .with_context(|| format!("Failed to parse metadata file: {}", path.display()))?;
        merge_values(&mut existing, patch_value);
        existing
    } else {
        patch_value
    };

    let content =
        toml::to_string_pretty(&merged).context("Failed to serialize merged metadata")?;
    atomic_write(&path, content.as_bytes())
        .with_context(|| format!("Failed to write metadata file: {}", path.display()))
}

/// Recursive merge: `patch` keys overwrite, tables merge key by key.
fn merge_values(existing: &mut Value, patch: Value) {
    match (existing, patch) {
        (Value::Table(existing_table), Value::Table(patch_table)) => {
            for (key, patch_value) in patch_table {
                match existing_table.get_mut(&key) {
                    Some(existing_value) => merge_values(existing_value, patch_value),
                    None => {
                        existing_table.insert(key, patch_value);
                    }
                }
            }
        }
        (existing_slot, patch_value) => *existing_slot = patch_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_read_absent_file_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(read(temp.path()).unwrap().is_none());
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let temp = TempDir::new().unwrap();
        let metadata = ExtensionMetadata {
            title: "News system".to_string(),
            version: Some(v("1.2.0")),
            category: "frontend".to_string(),
            clear_cache_on_load: true,
            ..Default::default()
        };

        write(temp.path(), &metadata).unwrap();
        let back = read(temp.path()).unwrap().unwrap();
        assert_eq!(back, metadata);
    }

    #[test]
    fn test_patch_preserves_shipped_fields() {
        let temp = TempDir::new().unwrap();
        let shipped = ExtensionMetadata {
            title: "News system".to_string(),
            description: "Versatile news".to_string(),
            author: "Jane Doe".to_string(),
            version: Some(v("1.0.0")),
            clear_cache_on_load: true,
            ..Default::default()
        };
        write(temp.path(), &shipped).unwrap();

        let entry = ExtensionVersion::new("news", v("1.2.0")).with_category("frontend");
        write_patch(temp.path(), &ExtensionMetadata::from_catalog_entry(&entry)).unwrap();

        let merged = read(temp.path()).unwrap().unwrap();
        // Patched fields follow the catalog.
        assert_eq!(merged.version, Some(v("1.2.0")));
        assert_eq!(merged.category, "frontend");
        // Shipped-only fields survive.
        assert_eq!(merged.title, "News system");
        assert_eq!(merged.description, "Versatile news");
        assert_eq!(merged.author, "Jane Doe");
        assert!(merged.clear_cache_on_load);
    }

    #[test]
    fn test_patch_without_existing_file() {
        let temp = TempDir::new().unwrap();
        let entry = ExtensionVersion::new("news", v("2.0.0"));

        write_patch(temp.path(), &ExtensionMetadata::from_catalog_entry(&entry)).unwrap();
        let written = read(temp.path()).unwrap().unwrap();
        assert_eq!(written.version, Some(v("2.0.0")));
        assert!(written.title.is_empty());
    }

    #[test]
    fn test_constraint_tables_merge_recursively() {
        let temp = TempDir::new().unwrap();
        let mut shipped = ExtensionMetadata {
            title: "News".to_string(),
            ..Default::default()
        };
        shipped
            .constraints
            .suggests
            .insert("rss_feed".to_string(), VersionRange::parse("1.0.0").unwrap());
        write(temp.path(), &shipped).unwrap();

        let entry = ExtensionVersion::new("news", v("1.2.0"))
            .with_edge(ConstraintEdge::depends("lang", "1.0.0-2.0.0").unwrap());
        write_patch(temp.path(), &ExtensionMetadata::from_catalog_entry(&entry)).unwrap();

        let merged = read(temp.path()).unwrap().unwrap();
        assert_eq!(merged.constraints.depends.len(), 1);
        assert!(merged.constraints.depends.contains_key("lang"));
        // The shipped suggests table is still there.
        assert!(merged.constraints.suggests.contains_key("rss_feed"));
    }

    #[test]
    fn test_constraints_to_edges() {
        let entry = ExtensionVersion::new("news", v("1.0.0"))
            .with_edge(ConstraintEdge::depends("lang", "1.0.0").unwrap())
            .with_edge(ConstraintEdge::conflicts("old_news", "").unwrap());
        let metadata = ExtensionMetadata::from_catalog_entry(&entry);

        let edges = metadata.constraints.edges();
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().any(|e| e.is_depends() && e.target_key == "lang"));
        assert!(edges.iter().any(|e| e.is_conflicts() && e.target_key == "old_news"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(METADATA_FILE), "title = [broken").unwrap();
        assert!(read(temp.path()).is_err());
    }
}
