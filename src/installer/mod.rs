//! Installation orchestrator.
//!
//! Consumes a [`ResolutionPlan`] and drives each entry through the install
//! pipeline: fetch and verify the archive, unpack into a fresh package
//! directory, merge and persist metadata, activate, then run the one-time
//! setup imports guarded by the [`ExecutionLedger`]. Batches are executed
//! dependency-first with per-package failure isolation: a failed package
//! marks its dependents skipped, independent packages still install.
//!
//! Cache flushing, the schema update and the installed-set reload happen
//! once per batch, not per package. Uninstall refuses to remove a package
//! other installed packages still depend on.
//!
//! Every mutating operation holds the per-extension [`OperationLock`], so
//! concurrent extman processes never interleave work on the same key.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::archive;
use crate::catalog::{Catalog, ExtensionVersion};
use crate::config::Config;
use crate::constants::{
    CACHE_GROUP_SYSTEM, LEDGER_NS_DATA_IMPORT, LEDGER_NS_SITE_IMPORT, SEED_DIR, SEED_FILES_DIR,
    SEED_RECORDS, SEED_SITES_DIR, SEED_STATIC_SQL,
};
use crate::core::ExtmanError;
use crate::fetch::{self, Fetcher};
use crate::installed::{InstalledPackage, InstalledPackageSet};
use crate::ledger::ExecutionLedger;
use crate::metadata::{self, ExtensionMetadata};
use crate::pkgdir;
use crate::providers::{
    ActivationObserver, CacheService, PackageActivation, SchemaService, SeedImporter,
};
use crate::resolver::{ResolutionPlan, Resolver, ResolverOptions};
use crate::utils::{copy_dir_recursive, sha256_hex};
use crate::version::Version;

pub mod lock;

pub use lock::OperationLock;

/// Progress of one package through the install pipeline.
///
/// Steps advance strictly in order; any error leaves the package `Failed`
/// with the remaining steps aborted. Files already written by an earlier
/// step are not rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStep {
    /// Selected by the plan, nothing done yet
    Pending,
    /// Archive fetched, verified and unpacked into a fresh directory
    FilesEnsured,
    /// Metadata merged with any pre-existing file and persisted
    MetadataWritten,
    /// Activation provider updated, observers notified
    Activated,
    /// One-time setup imports done (or skipped via the ledger)
    SetupComplete,
    /// A step errored; later steps were not attempted
    Failed,
}

/// Terminal outcome for one package of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOutcome {
    /// The package completed the full pipeline
    Installed,
    /// Not attempted because a dependency failed or was skipped earlier in
    /// the batch; `failed_dependency` names the direct blocker
    SkippedDependencyFailed {
        /// The direct dependency that failed or was itself skipped
        failed_dependency: String,
    },
    /// A pipeline step failed
    Failed {
        /// Rendered error chain of the failing step
        reason: String,
    },
}

/// Result of one install request: the plan that was executed and the
/// terminal outcome per planned package, in execution order.
///
/// An already-fully-installed root produces an empty plan and an empty
/// outcome list; that is a report, not an error.
#[derive(Debug)]
pub struct InstallResult {
    /// The resolution plan the batch executed
    pub plan: ResolutionPlan,
    /// Terminal outcome per package, in the order they were processed
    pub outcomes: Vec<(String, PackageOutcome)>,
}

impl InstallResult {
    /// Whether every processed package installed successfully.
    #[must_use]
    pub fn all_installed(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| matches!(outcome, PackageOutcome::Installed))
    }

    /// The outcome recorded for `extension_key`, if it was part of the batch.
    #[must_use]
    pub fn outcome_for(&self, extension_key: &str) -> Option<&PackageOutcome> {
        self.outcomes.iter().find(|(key, _)| key == extension_key).map(|(_, outcome)| outcome)
    }
}

/// Executes resolution plans against the local installation.
///
/// Collaborators are injected: the activation provider owns the installed
/// set, the ledger guards one-time imports, cache/schema/seed services
/// receive the batch side effects. The catalog and configuration are
/// borrowed for the orchestrator's lifetime.
pub struct Installer<'a> {
    catalog: &'a Catalog,
    config: &'a Config,
    fetcher: Fetcher,
    activation: Box<dyn PackageActivation>,
    observers: Vec<Box<dyn ActivationObserver>>,
    cache: Box<dyn CacheService>,
    schema: Box<dyn SchemaService>,
    seeds: Box<dyn SeedImporter>,
    ledger: ExecutionLedger,
}

impl<'a> Installer<'a> {
    /// Builds an orchestrator from its injected collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: &'a Catalog,
        config: &'a Config,
        fetcher: Fetcher,
        activation: Box<dyn PackageActivation>,
        cache: Box<dyn CacheService>,
        schema: Box<dyn SchemaService>,
        seeds: Box<dyn SeedImporter>,
        ledger: ExecutionLedger,
    ) -> Self {
        Self {
            catalog,
            config,
            fetcher,
            activation,
            observers: Vec::new(),
            cache,
            schema,
            seeds,
            ledger,
        }
    }

    /// Registers an activation observer. Observers are notified after
    /// activate/deactivate; their failures are logged, never fatal.
    #[must_use]
    pub fn with_observer(mut self, observer: Box<dyn ActivationObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// A fresh snapshot of the installed package set.
    pub fn installed(&self) -> Result<InstalledPackageSet> {
        self.activation.installed()
    }

    /// Resolves an install request without executing it.
    ///
    /// Failures discovered during the walk are data on the returned plan;
    /// only an unknown key or version fails the call itself.
    pub fn resolve(
        &self,
        extension_key: &str,
        version: Option<&Version>,
    ) -> Result<ResolutionPlan> {
        let installed = self.activation.installed()?;
        Resolver::new(self.catalog, &installed).resolve(extension_key, version)
    }

    /// Installs `extension_key` (the catalog's current version unless an
    /// explicit one is given) together with everything it depends on.
    ///
    /// A plan with conflicts or unresolvable dependencies fails the request
    /// with the corresponding typed error before anything is touched. With
    /// `automatic_installation` disabled in the configuration the request is
    /// routed through the skip-check resolver path: the package is fetched
    /// and unpacked only, never activated or set up.
    pub async fn install(
        &mut self,
        extension_key: &str,
        version: Option<&Version>,
    ) -> Result<InstallResult> {
        if !self.config.automatic_installation {
            debug!(extension_key, "Automatic installation disabled; routing through download-only");
            let installed = self.activation.installed()?;
            let resolver = Resolver::with_options(
                self.catalog,
                &installed,
                ResolverOptions { skip_dependency_checks: true },
            );
            let plan = resolver.resolve(extension_key, version)?;
            self.download_only(extension_key, version).await?;
            return Ok(InstallResult { plan, outcomes: Vec::new() });
        }

        let plan = self.resolve(extension_key, version)?;
        self.install_plan(plan).await
    }

    /// Executes an already-resolved plan.
    ///
    /// Packages are processed in the plan's dependency-first order. A failed
    /// package marks every package depending on it (directly or through the
    /// chain) as skipped; independent packages still install. The cache
    /// flush, schema update and installed-set reload run once at the end of
    /// the batch when at least one package installed.
    pub async fn install_plan(&mut self, plan: ResolutionPlan) -> Result<InstallResult> {
        if let Some(problem) = plan.first_problem() {
            return Err(problem.into());
        }

        let mut outcomes: Vec<(String, PackageOutcome)> = Vec::new();
        let mut blocked: BTreeSet<String> = BTreeSet::new();
        let mut flush_all = false;
        let mut installed_count = 0usize;

        for entry in &plan.ordered_install_set {
            let key = entry.extension_key.clone();

            let direct_blocker = entry
                .depends_edges()
                .map(|edge| edge.target_key.as_str())
                .find(|target| blocked.contains(*target));
            if let Some(blocker) = direct_blocker {
                warn!(
                    extension_key = %key,
                    failed_dependency = blocker,
                    "Skipping install; a dependency failed earlier in this batch"
                );
                blocked.insert(key.clone());
                outcomes.push((
                    key,
                    PackageOutcome::SkippedDependencyFailed {
                        failed_dependency: blocker.to_string(),
                    },
                ));
                continue;
            }

            match self.install_package(entry).await {
                Ok(clear_cache) => {
                    flush_all |= clear_cache;
                    installed_count += 1;
                    outcomes.push((key, PackageOutcome::Installed));
                }
                Err(e) => {
                    let reason = format!("{e:#}");
                    warn!(
                        extension_key = %key,
                        error = %reason,
                        "Install failed; dependents in this batch will be skipped"
                    );
                    blocked.insert(key.clone());
                    outcomes.push((key, PackageOutcome::Failed { reason }));
                }
            }
        }

        if installed_count > 0 {
            self.finish_batch(flush_all)?;
        }

        Ok(InstallResult { plan, outcomes })
    }

    /// Fetches and unpacks a package without activating it.
    ///
    /// Returns the package directory. Used directly for explicit
    /// download-only requests and indirectly when `automatic_installation`
    /// is off.
    pub async fn download_only(
        &self,
        extension_key: &str,
        version: Option<&Version>,
    ) -> Result<PathBuf> {
        let entry = self.lookup_entry(extension_key, version)?;
        let _lock = OperationLock::acquire_with_timeout(
            &self.config.state_dir(),
            extension_key,
            self.config.lock_timeout(),
        )
        .await?;

        let package_dir = self.ensure_package_files(&entry).await?;
        info!(
            extension_key,
            version = %entry.version,
            path = %package_dir.display(),
            "Package downloaded and unpacked; activation skipped"
        );
        Ok(package_dir)
    }

    /// Deactivates and removes an installed package.
    ///
    /// Fails with [`ExtmanError::DependencyBlocked`] while other installed
    /// packages still declare a dependency on it. On success the package
    /// directory is removed and the system cache group flushed. Ledger
    /// markers are deliberately kept: a later reinstall must not repeat
    /// one-time imports.
    pub async fn uninstall(&mut self, extension_key: &str) -> Result<()> {
        let installed = self.activation.installed()?;
        if !installed.contains(extension_key) {
            anyhow::bail!("Extension '{extension_key}' is not installed");
        }

        let blockers = installed.dependents_of(extension_key);
        if !blockers.is_empty() {
            return Err(ExtmanError::DependencyBlocked {
                extension_key: extension_key.to_string(),
                blockers,
            }
            .into());
        }

        let _lock = OperationLock::acquire_with_timeout(
            &self.config.state_dir(),
            extension_key,
            self.config.lock_timeout(),
        )
        .await?;

        self.activation
            .deactivate(extension_key)
            .with_context(|| format!("Failed to deactivate '{extension_key}'"))?;
        self.notify_deactivated(extension_key);

        let package_dir = pkgdir::extension_dir(&self.config.extensions_dir(), extension_key);
        pkgdir::remove(&package_dir)?;

        self.cache.flush_group(CACHE_GROUP_SYSTEM)?;
        info!(extension_key, "Extension uninstalled");
        Ok(())
    }

    /// The highest catalog version strictly newer than the installed one
    /// that resolves cleanly, walking candidates from the highest down.
    ///
    /// Returns `None` when the key is not installed or no candidate
    /// qualifies.
    pub fn get_update_candidate(&self, extension_key: &str) -> Result<Option<ExtensionVersion>> {
        let installed = self.activation.installed()?;
        let Some(package) = installed.get(extension_key) else {
            return Ok(None);
        };

        let newer =
            self.catalog.find_versions_in_range(extension_key, package.version.to_integer(), 0);
        let resolver = Resolver::new(self.catalog, &installed);
        for candidate in newer.iter().rev() {
            let plan = resolver.resolve(extension_key, Some(&candidate.version))?;
            if plan.is_clean() {
                debug!(extension_key, candidate = %candidate.version, "Update candidate found");
                return Ok(Some(candidate.clone()));
            }
        }
        Ok(None)
    }

    /// Runs one package through the pipeline under its operation lock.
    ///
    /// Returns the package's `clear_cache_on_load` flag so the batch can
    /// decide between a full and a group cache flush.
    async fn install_package(&mut self, entry: &ExtensionVersion) -> Result<bool> {
        let key = entry.extension_key.as_str();

        let _lock = OperationLock::acquire_with_timeout(
            &self.config.state_dir(),
            key,
            self.config.lock_timeout(),
        )
        .await?;

        debug!(
            extension_key = key,
            version = %entry.version,
            step = ?InstallStep::Pending,
            "Install pipeline started"
        );

        let package_dir = self.ensure_package_files(entry).await?;
        debug!(extension_key = key, step = ?InstallStep::FilesEnsured, "Package files in place");

        let patch = ExtensionMetadata::from_catalog_entry(entry);
        metadata::write_patch(&package_dir, &patch)
            .with_context(|| format!("Failed to write metadata for '{key}'"))?;
        let merged = metadata::read(&package_dir)?
            .context("Metadata file missing right after it was written")?;
        debug!(extension_key = key, step = ?InstallStep::MetadataWritten, "Metadata persisted");

        let package = InstalledPackage::new(entry.version)
            .with_dependencies(merged.constraints.edges())
            .with_clear_cache_on_load(merged.clear_cache_on_load);
        self.activation
            .activate(key, package)
            .with_context(|| format!("Failed to activate '{key}'"))?;
        self.notify_activated(key);
        debug!(extension_key = key, step = ?InstallStep::Activated, "Package activated");

        self.run_setup(key, &package_dir)
            .with_context(|| format!("One-time setup for '{key}' failed"))?;
        debug!(extension_key = key, step = ?InstallStep::SetupComplete, "Setup imports complete");

        info!(extension_key = key, version = %entry.version, "Extension installed");
        Ok(merged.clear_cache_on_load)
    }

    /// Fetches the archive, verifies it against the catalog content hash and
    /// unpacks it into a freshly cleared package directory.
    async fn ensure_package_files(&self, entry: &ExtensionVersion) -> Result<PathBuf> {
        let key = entry.extension_key.as_str();

        let bytes = self.fetcher.fetch(key, &entry.version).await?;
        fetch::verify(key, &bytes, &entry.content_hash)?;

        let package_dir = pkgdir::extension_dir(&self.config.extensions_dir(), key);
        pkgdir::ensure_clean(&package_dir)?;
        let files = archive::extract(key, &bytes, &package_dir)?;
        debug!(extension_key = key, files, "Package archive unpacked");
        Ok(package_dir)
    }

    /// Batch epilogue: schema update, one cache flush, installed-set reload.
    fn finish_batch(&mut self, flush_all: bool) -> Result<()> {
        self.schema.update_schema().context("Schema update after install batch failed")?;

        if flush_all {
            info!("Flushing all caches; an installed package declares clear_cache_on_load");
            self.cache.flush_all()?;
        } else {
            debug!(group = CACHE_GROUP_SYSTEM, "Flushing system cache group");
            self.cache.flush_group(CACHE_GROUP_SYSTEM)?;
        }

        let reloaded =
            self.activation.installed().context("Failed to reload the installed package set")?;
        debug!(installed = reloaded.len(), "Installed package set reloaded after batch");
        Ok(())
    }

    /// One-time setup imports for a freshly activated package, each guarded
    /// by the execution ledger.
    fn run_setup(&mut self, extension_key: &str, package_dir: &Path) -> Result<()> {
        self.import_seed_files(extension_key, package_dir)?;
        self.import_static_sql(extension_key, package_dir)?;
        self.import_records(extension_key, package_dir)?;
        self.import_site_configs(extension_key, package_dir)?;
        Ok(())
    }

    /// Copies `seed/files/**` into the assets tree once per extension key.
    fn import_seed_files(&mut self, extension_key: &str, package_dir: &Path) -> Result<()> {
        let ledger_key = format!("{extension_key}/{SEED_DIR}/{SEED_FILES_DIR}");
        if self.ledger.is_marked(LEDGER_NS_DATA_IMPORT, &ledger_key) {
            debug!(extension_key, "Seed files already imported");
            return Ok(());
        }

        let source = package_dir.join(SEED_DIR).join(SEED_FILES_DIR);
        if !source.is_dir() {
            return Ok(());
        }

        let dest = self.config.assets_dir().join(extension_key);
        let copied = copy_dir_recursive(&source, &dest)
            .with_context(|| format!("Failed to import seed files for '{extension_key}'"))?;
        self.ledger.set(LEDGER_NS_DATA_IMPORT, &ledger_key, "1")?;
        info!(extension_key, files = copied, "Seed files imported");
        Ok(())
    }

    /// Feeds `seed/static.sql` to the seed importer once per content hash.
    ///
    /// The marker is the hash of the file content and is written even when
    /// the file is absent (hash of the empty string), so the check on later
    /// installs is a single ledger lookup. Changed content on a newer
    /// version re-imports.
    fn import_static_sql(&mut self, extension_key: &str, package_dir: &Path) -> Result<()> {
        let ledger_key = format!("{extension_key}/{SEED_DIR}/{SEED_STATIC_SQL}");
        let path = package_dir.join(SEED_DIR).join(SEED_STATIC_SQL);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        let marker = sha256_hex(content.as_bytes());
        if self.ledger.get(LEDGER_NS_DATA_IMPORT, &ledger_key) == Some(marker.as_str()) {
            debug!(extension_key, "Static SQL already imported for this content");
            return Ok(());
        }

        if !content.is_empty() {
            self.seeds
                .import_static_sql(extension_key, &content)
                .with_context(|| format!("Static SQL import for '{extension_key}' failed"))?;
            info!(extension_key, "Static SQL imported");
        }
        self.ledger.set(LEDGER_NS_DATA_IMPORT, &ledger_key, marker)?;
        Ok(())
    }

    /// Feeds `seed/records.toml` to the seed importer once.
    ///
    /// The marker is written only on success; a failed import is logged and
    /// the install continues, leaving the key unmarked so a later install
    /// retries.
    fn import_records(&mut self, extension_key: &str, package_dir: &Path) -> Result<()> {
        let ledger_key = format!("{extension_key}/{SEED_DIR}/{SEED_RECORDS}");
        if self.ledger.is_marked(LEDGER_NS_DATA_IMPORT, &ledger_key) {
            debug!(extension_key, "Record import already performed");
            return Ok(());
        }

        let path = package_dir.join(SEED_DIR).join(SEED_RECORDS);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        match self.seeds.import_records(extension_key, &content) {
            Ok(()) => {
                self.ledger.set(LEDGER_NS_DATA_IMPORT, &ledger_key, "1")?;
                info!(extension_key, "Seed records imported");
            }
            Err(e) => {
                warn!(
                    extension_key,
                    error = format!("{e:#}"),
                    "Record import failed; continuing install"
                );
            }
        }
        Ok(())
    }

    /// Copies each `seed/sites/<id>/` directory into the site configuration
    /// tree once per site identifier.
    ///
    /// A site identifier that already exists on disk is skipped with a
    /// warning and still marked, so it is never retried.
    fn import_site_configs(&mut self, extension_key: &str, package_dir: &Path) -> Result<()> {
        let sites_root = package_dir.join(SEED_DIR).join(SEED_SITES_DIR);
        if !sites_root.is_dir() {
            return Ok(());
        }

        let mut entries: Vec<fs::DirEntry> = fs::read_dir(&sites_root)
            .and_then(Iterator::collect)
            .with_context(|| format!("Failed to list {}", sites_root.display()))?;
        entries.sort_by_key(fs::DirEntry::file_name);

        for dir_entry in entries {
            if !dir_entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let site_id = dir_entry.file_name().to_string_lossy().into_owned();

            if self.ledger.is_marked(LEDGER_NS_SITE_IMPORT, &site_id) {
                debug!(extension_key, site = %site_id, "Site configuration already imported");
                continue;
            }

            let dest = self.config.sites_dir().join(&site_id);
            if dest.exists() {
                warn!(
                    extension_key,
                    site = %site_id,
                    "Site identifier already present; keeping the existing configuration"
                );
            } else {
                copy_dir_recursive(&dir_entry.path(), &dest).with_context(|| {
                    format!("Failed to import site configuration '{site_id}'")
                })?;
                info!(extension_key, site = %site_id, "Site configuration imported");
            }
            self.ledger.set(LEDGER_NS_SITE_IMPORT, &site_id, "1")?;
        }
        Ok(())
    }

    fn notify_activated(&self, extension_key: &str) {
        for observer in &self.observers {
            if let Err(e) = observer.on_activated(extension_key) {
                warn!(extension_key, error = %e, "Activation observer failed");
            }
        }
    }

    fn notify_deactivated(&self, extension_key: &str) {
        for observer in &self.observers {
            if let Err(e) = observer.on_deactivated(extension_key) {
                warn!(extension_key, error = %e, "Deactivation observer failed");
            }
        }
    }

    /// Catalog lookup for an explicit or current version, with typed errors.
    fn lookup_entry(
        &self,
        extension_key: &str,
        version: Option<&Version>,
    ) -> Result<ExtensionVersion> {
        let entry = match version {
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
        Ok(entry)
    }
}
