//! Catalog entry types: extension versions and their constraint edges.
//!
//! An [`ExtensionVersion`] is one row of the catalog, identified by
//! `(extension_key, version)`. Rows are created by catalog import and never
//! mutated afterwards except for the `current` flag, which the catalog
//! recomputes whenever versions for a key are inserted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::version::{Version, VersionRange};

/// Release state of an extension version, as declared by its author.
///
/// States carry an ordinal rank used when electing the "current" version of a
/// key: the highest version whose rank reaches [`ExtensionState::STABLE_RANK`]
/// wins. End-of-life states (obsolete, excluded from updates) rank lowest so a
/// stale stable release still beats them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ExtensionState {
    /// Early development, no stability promises
    Unstable,
    /// Published for evaluation only
    Experimental,
    /// Feature-incomplete preview
    Alpha,
    /// Feature-complete, still stabilizing
    Beta,
    /// Production-ready
    #[default]
    Stable,
    /// No longer maintained
    Obsolete,
    /// Hidden from update candidates
    ExcludeFromUpdates,
}

impl ExtensionState {
    /// Rank at which a state counts as stable-or-better.
    pub const STABLE_RANK: u8 = 4;

    /// Ordinal rank of this state.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Obsolete | Self::ExcludeFromUpdates => 0,
            Self::Unstable => 1,
            Self::Experimental => 2,
            Self::Alpha => 3,
            Self::Beta => 3,
            Self::Stable => Self::STABLE_RANK,
        }
    }

    /// Whether this state qualifies a version for the current flag election.
    #[must_use]
    pub const fn is_stable_or_better(self) -> bool {
        self.rank() >= Self::STABLE_RANK
    }
}

/// Kind of a constraint edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintKind {
    /// Target must be installed at a version inside the range
    Depends,
    /// Target must not be installed at a version inside the range
    Conflicts,
    /// Target is recommended; never forces inclusion
    Suggests,
}

/// One declared constraint of an extension version.
///
/// Owned exclusively by its [`ExtensionVersion`]; edges are data, the
/// resolver interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintEdge {
    /// Edge kind
    pub kind: ConstraintKind,
    /// Extension key the edge points at
    pub target_key: String,
    /// Version range the edge constrains the target to (empty = any)
    #[serde(default)]
    pub range: VersionRange,
}

impl ConstraintEdge {
    /// A depends edge with a parsed range.
    pub fn depends(target_key: impl Into<String>, range: &str) -> anyhow::Result<Self> {
        Ok(Self {
            kind: ConstraintKind::Depends,
            target_key: target_key.into(),
            range: VersionRange::parse(range)?,
        })
    }

    /// A conflicts edge with a parsed range.
    pub fn conflicts(target_key: impl Into<String>, range: &str) -> anyhow::Result<Self> {
        Ok(Self {
            kind: ConstraintKind::Conflicts,
            target_key: target_key.into(),
            range: VersionRange::parse(range)?,
        })
    }

    /// A suggests edge with a parsed range.
    pub fn suggests(target_key: impl Into<String>, range: &str) -> anyhow::Result<Self> {
        Ok(Self {
            kind: ConstraintKind::Suggests,
            target_key: target_key.into(),
            range: VersionRange::parse(range)?,
        })
    }

    #[must_use]
    pub fn is_depends(&self) -> bool {
        self.kind == ConstraintKind::Depends
    }

    #[must_use]
    pub fn is_conflicts(&self) -> bool {
        self.kind == ConstraintKind::Conflicts
    }

    #[must_use]
    pub fn is_suggests(&self) -> bool {
        self.kind == ConstraintKind::Suggests
    }
}

fn default_timestamp() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// One known version of an extension: a single catalog row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionVersion {
    /// Extension key this version belongs to
    pub extension_key: String,
    /// The version triple
    pub version: Version,
    /// Packed integer form of `version`, kept alongside for range queries.
    /// Normalized on catalog insert.
    #[serde(default)]
    pub integer_version: u64,
    /// Author-declared release state
    #[serde(default)]
    pub state: ExtensionState,
    /// Review verdict from the catalog feed (negative = flagged)
    #[serde(default)]
    pub review_state: i32,
    /// Feed category ("frontend", "backend", ...)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    /// When the version was uploaded to the remote repository
    #[serde(default = "default_timestamp")]
    pub upload_timestamp: DateTime<Utc>,
    /// SHA-256 of the package archive, verified after download
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_hash: String,
    /// Whether this is the key's current version; maintained by the catalog
    #[serde(default)]
    pub current: bool,
    /// Declared constraint edges; kept last so TOML emits scalar fields
    /// before the edge tables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ConstraintEdge>,
    /// Insertion sequence, stamped by the catalog for import-order tie-breaks
    #[serde(skip)]
    pub(crate) import_seq: u64,
}

impl ExtensionVersion {
    /// A new catalog row with defaults: stable state, no edges, epoch upload
    /// time. The integer form is derived from the version.
    #[must_use]
    pub fn new(extension_key: impl Into<String>, version: Version) -> Self {
        Self {
            extension_key: extension_key.into(),
            version,
            integer_version: version.to_integer(),
            state: ExtensionState::default(),
            review_state: 0,
            dependencies: Vec::new(),
            category: String::new(),
            upload_timestamp: default_timestamp(),
            content_hash: String::new(),
            current: false,
            import_seq: 0,
        }
    }

    /// Set the release state.
    #[must_use]
    pub fn with_state(mut self, state: ExtensionState) -> Self {
        self.state = state;
        self
    }

    /// Set the feed category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the upload timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.upload_timestamp = timestamp;
        self
    }

    /// Set the archive content hash.
    #[must_use]
    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = hash.into();
        self
    }

    /// Append a constraint edge.
    #[must_use]
    pub fn with_edge(mut self, edge: ConstraintEdge) -> Self {
        self.dependencies.push(edge);
        self
    }

    /// Depends edges of this version.
    pub fn depends_edges(&self) -> impl Iterator<Item = &ConstraintEdge> {
        self.dependencies.iter().filter(|e| e.kind == ConstraintKind::Depends)
    }

    /// Conflicts edges of this version.
    pub fn conflicts_edges(&self) -> impl Iterator<Item = &ConstraintEdge> {
        self.dependencies.iter().filter(|e| e.kind == ConstraintKind::Conflicts)
    }

    /// Suggests edges of this version.
    pub fn suggests_edges(&self) -> impl Iterator<Item = &ConstraintEdge> {
        self.dependencies.iter().filter(|e| e.kind == ConstraintKind::Suggests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_ranks() {
        assert!(ExtensionState::Stable.is_stable_or_better());
        assert!(!ExtensionState::Beta.is_stable_or_better());
        assert!(!ExtensionState::Alpha.is_stable_or_better());
        assert!(!ExtensionState::Obsolete.is_stable_or_better());
        assert_eq!(ExtensionState::Obsolete.rank(), 0);
        assert_eq!(ExtensionState::ExcludeFromUpdates.rank(), 0);
        assert!(ExtensionState::Beta.rank() < ExtensionState::Stable.rank());
    }

    #[test]
    fn test_state_serde_names() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            state: ExtensionState,
        }

        let toml_str = toml::to_string(&Wrapper {
            state: ExtensionState::ExcludeFromUpdates,
        })
        .unwrap();
        assert!(toml_str.contains("excludeFromUpdates"));

        let back: Wrapper = toml::from_str("state = \"beta\"\n").unwrap();
        assert_eq!(back.state, ExtensionState::Beta);
    }

    #[test]
    fn test_new_derives_integer_version() {
        let v = ExtensionVersion::new("news", Version::new(2, 3, 1));
        assert_eq!(v.integer_version, 2_003_001);
        assert!(!v.current);
        assert_eq!(v.state, ExtensionState::Stable);
    }

    #[test]
    fn test_edge_constructors() {
        let edge = ConstraintEdge::depends("lang", "1.0.0-2.0.0").unwrap();
        assert_eq!(edge.kind, ConstraintKind::Depends);
        assert_eq!(edge.target_key, "lang");
        assert!(edge.range.contains(&Version::new(1, 5, 0)));

        let edge = ConstraintEdge::conflicts("oldbase", "").unwrap();
        assert!(edge.range.is_any());

        assert!(ConstraintEdge::depends("lang", "2.0.0-1.0.0").is_err());
    }

    #[test]
    fn test_edge_filters() {
        let v = ExtensionVersion::new("news", Version::new(1, 0, 0))
            .with_edge(ConstraintEdge::depends("lang", "").unwrap())
            .with_edge(ConstraintEdge::conflicts("oldnews", "").unwrap())
            .with_edge(ConstraintEdge::suggests("rte", "").unwrap());

        assert_eq!(v.depends_edges().count(), 1);
        assert_eq!(v.conflicts_edges().count(), 1);
        assert_eq!(v.suggests_edges().count(), 1);
        assert_eq!(v.depends_edges().next().unwrap().target_key, "lang");
    }

    #[test]
    fn test_serde_round_trip() {
        let v = ExtensionVersion::new("news", Version::new(1, 2, 0))
            .with_state(ExtensionState::Beta)
            .with_category("frontend")
            .with_content_hash("abc")
            .with_edge(ConstraintEdge::depends("lang", "1.0.0").unwrap());

        let toml_str = toml::to_string(&v).unwrap();
        let back: ExtensionVersion = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.extension_key, "news");
        assert_eq!(back.version, Version::new(1, 2, 0));
        assert_eq!(back.state, ExtensionState::Beta);
        assert_eq!(back.dependencies.len(), 1);
        assert_eq!(back.dependencies[0].target_key, "lang");
    }
}
