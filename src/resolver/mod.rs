//! Dependency resolution: from one requested extension to an ordered,
//! consistent install set.
//!
//! The resolver walks the depends edges of the requested version transitively
//! against the catalog, always picking the highest version inside each edge's
//! range. Conflict edges are checked against the installed set, suggests
//! edges are collected for display, and the result is a [`ResolutionPlan`].
//!
//! Plans fail closed: any unresolvable dependency or conflict empties the
//! ordered install set, so a caller can never install a partial plan by
//! accident. The failure details stay on the plan as data; raising them as
//! errors is the caller's decision (see [`ResolutionPlan::first_problem`]).
//!
//! # Resolution rules
//!
//! Per depends edge, in order:
//! 1. A version already selected into the plan for the target key must
//!    satisfy the edge's range; a mismatch is unresolvable (this is also how
//!    dependency cycles with incompatible ranges surface).
//! 2. An installed version inside the range satisfies the edge; nothing is
//!    planned.
//! 3. Otherwise the highest catalog version inside the range is selected and
//!    its own edges are walked, dependencies before dependents.
//!
//! Ordering uses a directed graph over the selected keys. When the graph has
//! a cycle whose ranges are all satisfied, the sort is impossible and the
//! discovery order (a post-order walk, dependencies first) is used instead.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use anyhow::Result;
use tracing::debug;

use crate::catalog::{Catalog, ConstraintEdge, ExtensionVersion};
use crate::core::ExtmanError;
use crate::installed::InstalledPackageSet;
use crate::version::{Version, VersionRange};

mod graph;

pub use graph::DependencyGraph;

/// Caller policy knobs for resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolverOptions {
    /// Skip dependency checking entirely: resolution returns an empty plan
    /// and the caller fetches the requested package only. Used when automatic
    /// installation is disabled.
    pub skip_dependency_checks: bool,
}

/// One conflict between a plan candidate and an installed package.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    /// The installed extension the candidate conflicts with
    pub conflicting_key: String,
    /// The installed version that falls inside the declared conflict range
    pub installed_version: Version,
    /// The declared conflict range
    pub range: VersionRange,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conflicts with installed '{}' {} (declared range '{}')",
            self.conflicting_key, self.installed_version, self.range
        )
    }
}

/// The outcome of one resolution request.
///
/// `ordered_install_set` lists new installs dependency-first with no
/// duplicate keys. A plan with any conflict or unresolvable entry has an
/// empty ordered set.
#[derive(Debug, Clone, Default)]
pub struct ResolutionPlan {
    /// New installs, dependencies before dependents
    pub ordered_install_set: Vec<ExtensionVersion>,
    /// Candidate key to its conflicts with installed packages
    pub conflict_set: BTreeMap<String, Vec<Conflict>>,
    /// Dependency key to the reason it could not be resolved
    pub unresolvable: BTreeMap<String, String>,
    /// Suggests edges encountered during the walk; informational only
    pub suggested: Vec<ConstraintEdge>,
}

impl ResolutionPlan {
    /// Whether the plan has no conflicts and nothing unresolvable.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflict_set.is_empty() && self.unresolvable.is_empty()
    }

    /// Whether the plan installs nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered_install_set.is_empty()
    }

    /// Whether `extension_key` is part of the ordered install set.
    #[must_use]
    pub fn contains(&self, extension_key: &str) -> bool {
        self.ordered_install_set.iter().any(|e| e.extension_key == extension_key)
    }

    /// The first failure on this plan as a typed error, if any.
    ///
    /// Unresolvable dependencies outrank conflicts; within each group the
    /// lowest key wins, so the choice is deterministic.
    #[must_use]
    pub fn first_problem(&self) -> Option<ExtmanError> {
        if let Some((key, reason)) = self.unresolvable.first_key_value() {
            return Some(ExtmanError::UnresolvableDependency {
                extension_key: key.clone(),
                reason: reason.clone(),
            });
        }
        if let Some((key, conflicts)) = self.conflict_set.first_key_value()
            && let Some(conflict) = conflicts.first()
        {
            return Some(ExtmanError::Conflict {
                extension_key: key.clone(),
                conflicting_key: conflict.conflicting_key.clone(),
            });
        }
        None
    }
}

/// Resolves install requests against a catalog and the installed set.
pub struct Resolver<'a> {
    catalog: &'a Catalog,
    installed: &'a InstalledPackageSet,
    options: ResolverOptions,
}

impl<'a> Resolver<'a> {
    #[must_use]
    pub fn new(catalog: &'a Catalog, installed: &'a InstalledPackageSet) -> Self {
        Self::with_options(catalog, installed, ResolverOptions::default())
    }

    #[must_use]
    pub fn with_options(
        catalog: &'a Catalog,
        installed: &'a InstalledPackageSet,
        options: ResolverOptions,
    ) -> Self {
        Self { catalog, installed, options }
    }

    /// Resolve an install request for `extension_key`.
    ///
    /// Without an explicit version the catalog's current version is used.
    /// Errors are limited to the request itself (unknown key or version);
    /// failures discovered during the walk are data on the returned plan.
    pub fn resolve(
        &self,
        extension_key: &str,
        version: Option<&Version>,
    ) -> Result<ResolutionPlan> {
        if self.options.skip_dependency_checks {
            debug!(extension_key, "Dependency checks disabled, returning empty plan");
            return Ok(ResolutionPlan::default());
        }

        let root = match version {
            Some(v) => self.catalog.find_version(extension_key, v).ok_or_else(|| {
                ExtmanError::VersionNotFound {
                    extension_key: extension_key.to_string(),
                    version: v.to_string(),
                }
            })?,
            None => self.catalog.current(extension_key).ok_or_else(|| {
                ExtmanError::ExtensionNotFound {
                    extension_key: extension_key.to_string(),
                }
            })?,
        };

        if self
            .installed
            .get(extension_key)
            .is_some_and(|p| p.version == root.version)
        {
            debug!(
                extension_key,
                version = %root.version,
                "Requested version already installed, nothing to plan"
            );
            return Ok(ResolutionPlan::default());
        }

        debug!(extension_key, version = %root.version, "Resolving install request");

        let mut walk = Walk {
            catalog: self.catalog,
            installed: self.installed,
            visited: HashMap::new(),
            selected: HashMap::new(),
            post_order: Vec::new(),
            graph: DependencyGraph::new(),
            conflict_set: BTreeMap::new(),
            unresolvable: BTreeMap::new(),
            suggested: Vec::new(),
        };
        walk.select(root);
        Ok(walk.into_plan())
    }

    /// Installed packages that depend on `extension_key`, sorted.
    #[must_use]
    pub fn dependents_of(&self, extension_key: &str) -> Vec<String> {
        self.installed.dependents_of(extension_key)
    }
}

/// Mutable state of one resolution walk.
struct Walk<'a> {
    catalog: &'a Catalog,
    installed: &'a InstalledPackageSet,
    /// Key to the version selected for it in this plan
    visited: HashMap<String, Version>,
    /// Key to its selected catalog row
    selected: HashMap<String, ExtensionVersion>,
    /// Keys in discovery post-order, dependencies first
    post_order: Vec<String>,
    graph: DependencyGraph,
    conflict_set: BTreeMap<String, Vec<Conflict>>,
    unresolvable: BTreeMap<String, String>,
    suggested: Vec<ConstraintEdge>,
}

impl Walk<'_> {
    /// Select `entry` into the plan and walk its edges.
    fn select(&mut self, entry: ExtensionVersion) {
        let key = entry.extension_key.clone();
        self.visited.insert(key.clone(), entry.version);
        self.graph.add_extension(&key);

        for edge in entry.conflicts_edges() {
            if let Some(installed) = self.installed.get(&edge.target_key)
                && edge.range.contains(&installed.version)
            {
                debug!(
                    extension_key = %key,
                    conflicting_key = %edge.target_key,
                    installed_version = %installed.version,
                    "Conflict with installed package"
                );
                self.conflict_set.entry(key.clone()).or_default().push(Conflict {
                    conflicting_key: edge.target_key.clone(),
                    installed_version: installed.version,
                    range: edge.range.clone(),
                });
            }
        }

        for edge in entry.suggests_edges() {
            if !self.suggested.contains(edge) {
                self.suggested.push(edge.clone());
            }
        }

        for edge in entry.depends_edges() {
            self.resolve_edge(&key, edge);
        }

        self.post_order.push(key.clone());
        self.selected.insert(key, entry);
    }

    /// Resolve one depends edge declared by `dependent`.
    fn resolve_edge(&mut self, dependent: &str, edge: &ConstraintEdge) {
        let target = edge.target_key.as_str();

        if let Some(&planned) = self.visited.get(target) {
            if edge.range.contains(&planned) {
                self.graph.add_dependency(dependent, target);
            } else {
                self.unresolvable.insert(
                    target.to_string(),
                    format!(
                        "already selected at {planned}, which does not satisfy '{}' (required by '{dependent}')",
                        edge.range
                    ),
                );
            }
            return;
        }

        if self.installed.satisfies(target, &edge.range) {
            debug!(
                dependent,
                target,
                range = %edge.range,
                "Dependency satisfied by installed package"
            );
            return;
        }

        match self.catalog.find_highest_satisfying(target, &edge.range) {
            Some(candidate) => {
                debug!(
                    dependent,
                    target,
                    version = %candidate.version,
                    "Selected dependency version"
                );
                self.graph.add_dependency(dependent, target);
                self.select(candidate);
            }
            None => {
                let reason = if self.catalog.versions_of(target).is_empty() {
                    format!("extension not found in catalog (required by '{dependent}')")
                } else {
                    format!(
                        "no version satisfies '{}' (required by '{dependent}')",
                        edge.range
                    )
                };
                self.unresolvable.insert(target.to_string(), reason);
            }
        }
    }

    /// Finish the walk: order the selected set, or empty it on failure.
    fn into_plan(mut self) -> ResolutionPlan {
        let mut plan = ResolutionPlan {
            ordered_install_set: Vec::new(),
            conflict_set: self.conflict_set,
            unresolvable: self.unresolvable,
            suggested: self.suggested,
        };

        if !plan.is_clean() {
            debug!(
                conflicts = plan.conflict_set.len(),
                unresolvable = plan.unresolvable.len(),
                "Plan failed closed"
            );
            return plan;
        }

        let order = match self.graph.install_order() {
            Ok(order) => order,
            Err(err) => {
                debug!("{err}; falling back to discovery order");
                self.post_order
            }
        };
        plan.ordered_install_set =
            order.iter().filter_map(|key| self.selected.remove(key)).collect();
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installed::InstalledPackage;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn catalog_with(entries: Vec<ExtensionVersion>) -> Catalog {
        let catalog = Catalog::new();
        catalog.upsert_versions(entries).unwrap();
        catalog
    }

    fn ordered_keys(plan: &ResolutionPlan) -> Vec<&str> {
        plan.ordered_install_set.iter().map(|e| e.extension_key.as_str()).collect()
    }

    #[test]
    fn test_no_dependency_extension_resolves_to_itself() {
        let catalog = catalog_with(vec![ExtensionVersion::new("news", v("1.0.0"))]);
        let installed = InstalledPackageSet::new();

        let plan = Resolver::new(&catalog, &installed).resolve("news", None).unwrap();
        assert!(plan.is_clean());
        assert_eq!(ordered_keys(&plan), vec!["news"]);
        assert!(plan.suggested.is_empty());
    }

    #[test]
    fn test_chain_orders_dependencies_first() {
        let catalog = catalog_with(vec![
            ExtensionVersion::new("aaa_ext", v("1.0.0"))
                .with_edge(ConstraintEdge::depends("bbb_ext", "1.0.0").unwrap()),
            ExtensionVersion::new("bbb_ext", v("1.0.0"))
                .with_edge(ConstraintEdge::depends("ccc_ext", "1.0.0").unwrap()),
            ExtensionVersion::new("ccc_ext", v("1.0.0")),
        ]);
        let installed = InstalledPackageSet::new();

        let plan = Resolver::new(&catalog, &installed).resolve("aaa_ext", None).unwrap();
        assert!(plan.is_clean());
        assert_eq!(ordered_keys(&plan), vec!["ccc_ext", "bbb_ext", "aaa_ext"]);
    }

    #[test]
    fn test_highest_satisfying_version_selected() {
        let catalog = catalog_with(vec![
            ExtensionVersion::new("news", v("1.0.0"))
                .with_edge(ConstraintEdge::depends("lang", "1.0.0-2.0.0").unwrap()),
            ExtensionVersion::new("lang", v("1.0.0")),
            ExtensionVersion::new("lang", v("1.8.0")),
            ExtensionVersion::new("lang", v("2.5.0")),
        ]);
        let installed = InstalledPackageSet::new();

        let plan = Resolver::new(&catalog, &installed).resolve("news", None).unwrap();
        let lang = plan
            .ordered_install_set
            .iter()
            .find(|e| e.extension_key == "lang")
            .unwrap();
        assert_eq!(lang.version, v("1.8.0"));
    }

    #[test]
    fn test_unresolvable_dependency_fails_closed() {
        let catalog = catalog_with(vec![
            ExtensionVersion::new("news", v("1.0.0"))
                .with_edge(ConstraintEdge::depends("lang", "9.0.0").unwrap()),
            ExtensionVersion::new("lang", v("1.0.0")),
        ]);
        let installed = InstalledPackageSet::new();

        let plan = Resolver::new(&catalog, &installed).resolve("news", None).unwrap();
        assert!(plan.is_empty());
        assert!(plan.unresolvable.contains_key("lang"));
        assert!(plan.unresolvable["lang"].contains("no version satisfies"));

        match plan.first_problem() {
            Some(ExtmanError::UnresolvableDependency { extension_key, .. }) => {
                assert_eq!(extension_key, "lang");
            }
            other => panic!("unexpected problem: {other:?}"),
        }
    }

    #[test]
    fn test_missing_dependency_key_reported() {
        let catalog = catalog_with(vec![
            ExtensionVersion::new("news", v("1.0.0"))
                .with_edge(ConstraintEdge::depends("ghost", "").unwrap()),
        ]);
        let installed = InstalledPackageSet::new();

        let plan = Resolver::new(&catalog, &installed).resolve("news", None).unwrap();
        assert!(plan.is_empty());
        assert!(plan.unresolvable["ghost"].contains("not found in catalog"));
    }

    #[test]
    fn test_conflict_with_installed_package() {
        let catalog = catalog_with(vec![
            ExtensionVersion::new("newsletter", v("2.0.0"))
                .with_edge(ConstraintEdge::conflicts("direct_mail", "1.0.0").unwrap()),
        ]);
        let mut installed = InstalledPackageSet::new();
        installed.insert("direct_mail", InstalledPackage::new(v("1.4.0")));

        let plan = Resolver::new(&catalog, &installed).resolve("newsletter", None).unwrap();
        assert!(plan.is_empty());
        let conflicts = &plan.conflict_set["newsletter"];
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflicting_key, "direct_mail");
        assert_eq!(conflicts[0].installed_version, v("1.4.0"));

        match plan.first_problem() {
            Some(ExtmanError::Conflict { extension_key, conflicting_key }) => {
                assert_eq!(extension_key, "newsletter");
                assert_eq!(conflicting_key, "direct_mail");
            }
            other => panic!("unexpected problem: {other:?}"),
        }
    }

    #[test]
    fn test_conflict_range_excludes_installed_version() {
        let catalog = catalog_with(vec![
            ExtensionVersion::new("newsletter", v("2.0.0"))
                .with_edge(ConstraintEdge::conflicts("direct_mail", "2.0.0").unwrap()),
        ]);
        let mut installed = InstalledPackageSet::new();
        installed.insert("direct_mail", InstalledPackage::new(v("1.4.0")));

        let plan = Resolver::new(&catalog, &installed).resolve("newsletter", None).unwrap();
        assert!(plan.is_clean());
        assert_eq!(ordered_keys(&plan), vec!["newsletter"]);
    }

    #[test]
    fn test_installed_dependency_is_skipped() {
        let catalog = catalog_with(vec![
            ExtensionVersion::new("news", v("1.0.0"))
                .with_edge(ConstraintEdge::depends("lang", "1.0.0-2.0.0").unwrap()),
            ExtensionVersion::new("lang", v("1.9.0")),
        ]);
        let mut installed = InstalledPackageSet::new();
        installed.insert("lang", InstalledPackage::new(v("1.5.0")));

        let plan = Resolver::new(&catalog, &installed).resolve("news", None).unwrap();
        assert!(plan.is_clean());
        assert_eq!(ordered_keys(&plan), vec!["news"]);
    }

    #[test]
    fn test_outdated_installed_dependency_is_updated() {
        let catalog = catalog_with(vec![
            ExtensionVersion::new("news", v("2.0.0"))
                .with_edge(ConstraintEdge::depends("lang", "2.0.0-3.0.0").unwrap()),
            ExtensionVersion::new("lang", v("2.4.0")),
        ]);
        let mut installed = InstalledPackageSet::new();
        installed.insert("lang", InstalledPackage::new(v("1.5.0")));

        let plan = Resolver::new(&catalog, &installed).resolve("news", None).unwrap();
        assert!(plan.is_clean());
        assert_eq!(ordered_keys(&plan), vec!["lang", "news"]);
        assert_eq!(plan.ordered_install_set[0].version, v("2.4.0"));
    }

    #[test]
    fn test_benign_cycle_uses_discovery_order() {
        let catalog = catalog_with(vec![
            ExtensionVersion::new("frame", v("1.0.0"))
                .with_edge(ConstraintEdge::depends("widgets", "1.0.0").unwrap()),
            ExtensionVersion::new("widgets", v("1.2.0"))
                .with_edge(ConstraintEdge::depends("frame", "1.0.0").unwrap()),
        ]);
        let installed = InstalledPackageSet::new();

        let plan = Resolver::new(&catalog, &installed).resolve("frame", None).unwrap();
        assert!(plan.is_clean());
        // Discovery post-order: the recursed-into key first.
        assert_eq!(ordered_keys(&plan), vec!["widgets", "frame"]);
    }

    #[test]
    fn test_cycle_with_incompatible_range_is_unresolvable() {
        let catalog = catalog_with(vec![
            ExtensionVersion::new("frame", v("1.0.0"))
                .with_edge(ConstraintEdge::depends("widgets", "1.0.0").unwrap()),
            ExtensionVersion::new("widgets", v("1.2.0"))
                .with_edge(ConstraintEdge::depends("frame", "2.0.0").unwrap()),
        ]);
        let installed = InstalledPackageSet::new();

        let plan = Resolver::new(&catalog, &installed).resolve("frame", None).unwrap();
        assert!(plan.is_empty());
        assert!(plan.unresolvable["frame"].contains("already selected at 1.0.0"));
    }

    #[test]
    fn test_diamond_installs_shared_dependency_once() {
        let catalog = catalog_with(vec![
            ExtensionVersion::new("shop", v("1.0.0"))
                .with_edge(ConstraintEdge::depends("cart", "").unwrap())
                .with_edge(ConstraintEdge::depends("listing", "").unwrap()),
            ExtensionVersion::new("cart", v("1.0.0"))
                .with_edge(ConstraintEdge::depends("currency", "").unwrap()),
            ExtensionVersion::new("listing", v("1.0.0"))
                .with_edge(ConstraintEdge::depends("currency", "").unwrap()),
            ExtensionVersion::new("currency", v("3.0.0")),
        ]);
        let installed = InstalledPackageSet::new();

        let plan = Resolver::new(&catalog, &installed).resolve("shop", None).unwrap();
        assert!(plan.is_clean());
        let keys = ordered_keys(&plan);
        assert_eq!(keys.len(), 4);
        assert_eq!(keys.iter().filter(|k| **k == "currency").count(), 1);
        let currency = keys.iter().position(|k| *k == "currency").unwrap();
        let shop = keys.iter().position(|k| *k == "shop").unwrap();
        assert!(currency < shop);
    }

    #[test]
    fn test_suggests_recorded_but_not_installed() {
        let catalog = catalog_with(vec![
            ExtensionVersion::new("news", v("1.0.0"))
                .with_edge(ConstraintEdge::suggests("rss_feed", "1.0.0").unwrap()),
            ExtensionVersion::new("rss_feed", v("1.0.0")),
        ]);
        let installed = InstalledPackageSet::new();

        let plan = Resolver::new(&catalog, &installed).resolve("news", None).unwrap();
        assert_eq!(ordered_keys(&plan), vec!["news"]);
        assert_eq!(plan.suggested.len(), 1);
        assert_eq!(plan.suggested[0].target_key, "rss_feed");
    }

    #[test]
    fn test_explicit_version_request() {
        let catalog = catalog_with(vec![
            ExtensionVersion::new("news", v("1.0.0")),
            ExtensionVersion::new("news", v("2.0.0")),
        ]);
        let installed = InstalledPackageSet::new();
        let resolver = Resolver::new(&catalog, &installed);

        let plan = resolver.resolve("news", Some(&v("1.0.0"))).unwrap();
        assert_eq!(plan.ordered_install_set[0].version, v("1.0.0"));

        let err = resolver.resolve("news", Some(&v("3.0.0"))).unwrap_err();
        match err.downcast_ref::<ExtmanError>() {
            Some(ExtmanError::VersionNotFound { extension_key, version }) => {
                assert_eq!(extension_key, "news");
                assert_eq!(version, "3.0.0");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_root_key_is_an_error() {
        let catalog = Catalog::new();
        let installed = InstalledPackageSet::new();

        let err = Resolver::new(&catalog, &installed).resolve("ghost", None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExtmanError>(),
            Some(ExtmanError::ExtensionNotFound { .. })
        ));
    }

    #[test]
    fn test_already_installed_root_yields_empty_plan() {
        let catalog = catalog_with(vec![ExtensionVersion::new("news", v("1.0.0"))]);
        let mut installed = InstalledPackageSet::new();
        installed.insert("news", InstalledPackage::new(v("1.0.0")));

        let plan = Resolver::new(&catalog, &installed).resolve("news", None).unwrap();
        assert!(plan.is_clean());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_installed_root_at_other_version_plans_update() {
        let catalog = catalog_with(vec![
            ExtensionVersion::new("news", v("1.0.0")),
            ExtensionVersion::new("news", v("2.0.0")),
        ]);
        let mut installed = InstalledPackageSet::new();
        installed.insert("news", InstalledPackage::new(v("1.0.0")));

        let plan = Resolver::new(&catalog, &installed).resolve("news", None).unwrap();
        assert_eq!(ordered_keys(&plan), vec!["news"]);
        assert_eq!(plan.ordered_install_set[0].version, v("2.0.0"));
    }

    #[test]
    fn test_skip_dependency_checks_returns_empty_plan() {
        let catalog = catalog_with(vec![
            ExtensionVersion::new("news", v("1.0.0"))
                .with_edge(ConstraintEdge::depends("ghost", "").unwrap()),
        ]);
        let installed = InstalledPackageSet::new();
        let resolver = Resolver::with_options(
            &catalog,
            &installed,
            ResolverOptions { skip_dependency_checks: true },
        );

        let plan = resolver.resolve("news", None).unwrap();
        assert!(plan.is_clean());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_current_version_used_when_no_version_given() {
        let catalog = catalog_with(vec![
            ExtensionVersion::new("news", v("1.0.0")),
            ExtensionVersion::new("news", v("1.1.0"))
                .with_state(crate::catalog::ExtensionState::Beta),
        ]);
        let installed = InstalledPackageSet::new();

        let plan = Resolver::new(&catalog, &installed).resolve("news", None).unwrap();
        // Current points at the stable 1.0.0, not the newer beta.
        assert_eq!(plan.ordered_install_set[0].version, v("1.0.0"));
    }
}
