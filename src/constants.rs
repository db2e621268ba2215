//! Global constants used throughout the extman codebase.
//!
//! This module contains timeout durations, retry parameters, ledger
//! namespaces and file names that are used across multiple modules. Defining
//! them centrally improves maintainability and makes magic numbers more
//! discoverable.

use std::time::Duration;

/// Default timeout for per-extension operation lock acquisition (120 seconds).
///
/// Long enough to cover a full install of a large extension (download, unpack,
/// setup imports) held under the same lock by another process.
pub fn default_lock_timeout() -> Duration {
    Duration::from_secs(120)
}

/// Default timeout for a single package archive download (60 seconds).
pub fn default_download_timeout() -> Duration {
    Duration::from_secs(60)
}

/// Maximum backoff delay for exponential backoff (500ms).
///
/// Exponential backoff delays are capped at this value to prevent
/// excessive wait times during retry operations.
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Starting delay for exponential backoff (10ms).
///
/// This is the initial delay used in exponential backoff calculations,
/// which doubles on each retry attempt.
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Number of retry attempts for transient download failures.
pub const DOWNLOAD_RETRY_ATTEMPTS: usize = 3;

/// Multiplier for the major segment when packing a version triple into an
/// integer (`major * 1_000_000 + minor * 1_000 + patch`).
pub const VERSION_MAJOR_FACTOR: u64 = 1_000_000;

/// Multiplier for the minor segment of a packed version integer.
pub const VERSION_MINOR_FACTOR: u64 = 1_000;

/// Exclusive upper bound for a single version segment.
///
/// Packing is only injective while every segment stays below this; parse
/// rejects larger segments.
pub const VERSION_SEGMENT_LIMIT: u64 = 1_000;

/// Ledger namespace guarding one-time extension data imports
/// (seed files, static SQL, record import).
pub const LEDGER_NS_DATA_IMPORT: &str = "extension-data-import";

/// Ledger namespace guarding one-time site configuration imports.
pub const LEDGER_NS_SITE_IMPORT: &str = "site-config-import";

/// Cache group flushed after installs that do not request a full flush.
pub const CACHE_GROUP_SYSTEM: &str = "system";

/// Per-package metadata file name, written into each installed extension
/// directory.
pub const METADATA_FILE: &str = "extension.toml";

/// Directory inside a package that holds one-time seed material.
pub const SEED_DIR: &str = "seed";

/// Seed subdirectory copied into the assets tree on first install.
pub const SEED_FILES_DIR: &str = "files";

/// Seed file holding static SQL applied once per content hash.
pub const SEED_STATIC_SQL: &str = "static.sql";

/// Seed file holding an initial record import.
pub const SEED_RECORDS: &str = "records.toml";

/// Seed subdirectory holding site configuration directories keyed by site
/// identifier.
pub const SEED_SITES_DIR: &str = "sites";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_factors_consistent() {
        assert_eq!(VERSION_MAJOR_FACTOR, VERSION_MINOR_FACTOR * VERSION_SEGMENT_LIMIT);
    }

    #[test]
    fn test_timeouts_nonzero() {
        assert!(default_lock_timeout() > Duration::ZERO);
        assert!(default_download_timeout() > Duration::ZERO);
    }
}
