//! The set of currently active packages, as seen by the resolver.
//!
//! This view is owned by the activation provider and rebuilt before each
//! resolution, so the resolver always decides against fresh state. The
//! orchestrator mutates it only through its activate and deactivate steps.

use std::collections::BTreeMap;

use crate::catalog::ConstraintEdge;
use crate::version::{Version, VersionRange};

/// One active package with the constraint data the resolver needs.
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledPackage {
    pub version: Version,
    pub dependencies: Vec<ConstraintEdge>,
    /// Whether activating or updating this package requires a full cache
    /// flush rather than the system group only.
    pub clear_cache_on_load: bool,
}

impl InstalledPackage {
    #[must_use]
    pub fn new(version: Version) -> Self {
        Self {
            version,
            dependencies: Vec::new(),
            clear_cache_on_load: false,
        }
    }

    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Vec<ConstraintEdge>) -> Self {
        self.dependencies = dependencies;
        self
    }

    #[must_use]
    pub fn with_clear_cache_on_load(mut self, clear: bool) -> Self {
        self.clear_cache_on_load = clear;
        self
    }
}

/// Map of extension key to its installed package record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstalledPackageSet {
    packages: BTreeMap<String, InstalledPackage>,
}

impl InstalledPackageSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, extension_key: impl Into<String>, package: InstalledPackage) {
        self.packages.insert(extension_key.into(), package);
    }

    pub fn remove(&mut self, extension_key: &str) -> Option<InstalledPackage> {
        self.packages.remove(extension_key)
    }

    #[must_use]
    pub fn contains(&self, extension_key: &str) -> bool {
        self.packages.contains_key(extension_key)
    }

    #[must_use]
    pub fn get(&self, extension_key: &str) -> Option<&InstalledPackage> {
        self.packages.get(extension_key)
    }

    /// Whether `extension_key` is installed at a version inside `range`.
    #[must_use]
    pub fn satisfies(&self, extension_key: &str, range: &VersionRange) -> bool {
        self.packages
            .get(extension_key)
            .is_some_and(|p| range.contains(&p.version))
    }

    /// Keys of installed packages that declare a depends edge on
    /// `extension_key`, sorted. Conflicts and suggests edges do not count.
    #[must_use]
    pub fn dependents_of(&self, extension_key: &str) -> Vec<String> {
        self.packages
            .iter()
            .filter(|(key, package)| {
                *key != extension_key
                    && package
                        .dependencies
                        .iter()
                        .any(|edge| edge.is_depends() && edge.target_key == extension_key)
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &InstalledPackage)> {
        self.packages.iter()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.packages.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
