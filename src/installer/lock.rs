//! Per-extension operation locking.
//!
//! Install and uninstall rewrite the package directory, the metadata file
//! and the ledger for one key, so two extman processes must never interleave
//! work on the same extension. An OS advisory lock on
//! `{state_dir}/.locks/{key}.lock` serializes them; different keys stay
//! independent. Lock syscalls can block on another process, so they run on
//! the blocking pool, never on the async runtime itself.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::debug;

use crate::constants::{MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS, default_lock_timeout};
use crate::core::ExtmanError;

/// Exclusive lock over all mutating operations on one extension key.
///
/// Held for the duration of an install or uninstall and released on drop,
/// on every exit path. Acquisition polls the OS lock with exponential
/// backoff until [`ExtmanError::LockTimeout`].
#[derive(Debug)]
pub struct OperationLock {
    /// Open handle; the OS releases the lock when it closes.
    _file: Arc<std::fs::File>,
    extension_key: String,
    lock_path: PathBuf,
}

impl Drop for OperationLock {
    fn drop(&mut self) {
        debug!(extension_key = %self.extension_key, "Operation lock released");
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            // A missing file means another drop cleaned it up first.
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(
                    extension_key = %self.extension_key,
                    error = %e,
                    "Failed to remove lock file"
                );
            }
        }
    }
}

impl OperationLock {
    /// Acquire the lock for `extension_key`, waiting up to
    /// [`default_lock_timeout`].
    pub async fn acquire(state_dir: &Path, extension_key: &str) -> Result<Self> {
        Self::acquire_with_timeout(state_dir, extension_key, default_lock_timeout()).await
    }

    /// Acquire the lock for `extension_key` within `timeout`.
    ///
    /// Creates `{state_dir}/.locks/` and the key's lock file as needed, then
    /// retries a non-blocking exclusive lock with exponential backoff.
    /// Returns [`ExtmanError::LockTimeout`] when the holder does not release
    /// in time.
    pub async fn acquire_with_timeout(
        state_dir: &Path,
        extension_key: &str,
        timeout: Duration,
    ) -> Result<Self> {
        debug!(extension_key, "Waiting for operation lock");

        let locks_dir = state_dir.join(".locks");
        tokio::fs::create_dir_all(&locks_dir)
            .await
            .with_context(|| format!("Failed to create lock directory: {}", locks_dir.display()))?;

        let lock_path = locks_dir.join(format!("{extension_key}.lock"));

        let open_path = lock_path.clone();
        let file = tokio::task::spawn_blocking(move || {
            OpenOptions::new().create(true).write(true).truncate(false).open(&open_path)
        })
        .await
        .context("Lock file open task panicked")?
        .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;
        let file = Arc::new(file);

        let start = std::time::Instant::now();
        let backoff = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
            .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS));

        for delay in backoff {
            let attempt = Arc::clone(&file);
            let locked = tokio::task::spawn_blocking(move || attempt.try_lock_exclusive())
                .await
                .context("Lock attempt task panicked")?;

            match locked {
                Ok(true) => {
                    debug!(
                        extension_key,
                        wait_ms = start.elapsed().as_millis(),
                        "Operation lock acquired"
                    );
                    return Ok(Self {
                        _file: file,
                        extension_key: extension_key.to_string(),
                        lock_path,
                    });
                }
                Ok(false) | Err(_) => {
                    let remaining = timeout.saturating_sub(start.elapsed());
                    if remaining.is_zero() {
                        break;
                    }
                    // Never sleep past the deadline.
                    tokio::time::sleep(delay.min(remaining)).await;
                }
            }
        }

        Err(ExtmanError::LockTimeout {
            extension_key: extension_key.to_string(),
            timeout_secs: timeout.as_secs(),
        }
        .into())
    }
}
