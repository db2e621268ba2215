//! Collaborator interfaces consumed by the installation orchestrator.
//!
//! The engine does not know how the surrounding system activates packages,
//! flushes caches, migrates schemas or applies seed data. It talks to these
//! traits; the host wires in implementations. The file-backed defaults in
//! [`activation`] and [`local`] make the CLI operational against a plain
//! directory tree, without any CMS behind it.

use anyhow::Result;

use crate::installed::{InstalledPackage, InstalledPackageSet};

pub mod activation;
pub mod local;

pub use activation::FileActivationState;
pub use local::{DirCacheService, RecordingSchemaService, RecordingSeedImporter};

/// Owns the set of active packages.
///
/// `activate` and `deactivate` must persist the change before returning;
/// [`PackageActivation::installed`] is re-read before every resolution.
pub trait PackageActivation: Send + Sync {
    fn activate(&mut self, extension_key: &str, package: InstalledPackage) -> Result<()>;

    fn deactivate(&mut self, extension_key: &str) -> Result<()>;

    fn is_active(&self, extension_key: &str) -> bool;

    /// Snapshot of the active packages with their constraint data.
    fn installed(&self) -> Result<InstalledPackageSet>;
}

/// Notified after activation state changes.
///
/// Observer failures are logged and never fail the operation that triggered
/// them.
pub trait ActivationObserver: Send + Sync {
    fn on_activated(&self, extension_key: &str) -> Result<()>;

    fn on_deactivated(&self, extension_key: &str) -> Result<()>;
}

/// Cache invalidation at the end of a batch.
pub trait CacheService: Send + Sync {
    /// Drop every cache group.
    fn flush_all(&self) -> Result<()>;

    /// Drop one cache group.
    fn flush_group(&self, group: &str) -> Result<()>;
}

/// Schema migration hook, invoked once per install batch.
pub trait SchemaService: Send + Sync {
    fn update_schema(&self) -> Result<()>;
}

/// Sink for one-time seed data shipped inside packages.
pub trait SeedImporter: Send + Sync {
    /// Apply a package's static SQL.
    fn import_static_sql(&self, extension_key: &str, sql: &str) -> Result<()>;

    /// Apply a package's record import file.
    fn import_records(&self, extension_key: &str, content: &str) -> Result<()>;
}

/// Observer that only writes log lines.
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl ActivationObserver for LoggingObserver {
    fn on_activated(&self, extension_key: &str) -> Result<()> {
        tracing::info!(extension_key, "Extension activated");
        Ok(())
    }

    fn on_deactivated(&self, extension_key: &str) -> Result<()> {
        tracing::info!(extension_key, "Extension deactivated");
        Ok(())
    }
}
