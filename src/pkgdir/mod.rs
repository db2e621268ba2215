//! Package directory management: the on-disk tree of one extension version.
//!
//! Package directories live under the extensions root, one directory per
//! extension key. Unpacking always starts from a verified-empty directory,
//! and removal never follows a symlink into foreign territory: when the
//! package path itself is a link, only the link is removed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::ExtmanError;

/// The directory of `extension_key` under `root`.
#[must_use]
pub fn extension_dir(root: &Path, extension_key: &str) -> PathBuf {
    root.join(extension_key)
}

/// Make `path` an existing empty directory.
///
/// Whatever occupies the path is removed first: a symlink is unlinked without
/// touching its target, a directory is removed recursively, a plain file is
/// deleted. The post-condition (path exists and is a directory) is checked,
/// not assumed; a violation surfaces as
/// [`ExtmanError::DirectoryOperation`].
pub fn ensure_clean(path: &Path) -> Result<()> {
    remove(path)?;

    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))?;

    if !path.is_dir() {
        return Err(ExtmanError::DirectoryOperation {
            path: path.display().to_string(),
            reason: "path is not a directory after ensure-clean".to_string(),
        }
        .into());
    }
    debug!(path = %path.display(), "Package directory ready");
    Ok(())
}

/// Remove whatever occupies `path`; missing paths are fine.
///
/// Symlinks are detected before any existence check because a dangling link
/// reports as non-existent when followed.
pub fn remove(path: &Path) -> Result<()> {
    let metadata = match path.symlink_metadata() {
        Ok(m) => m,
        Err(_) => return Ok(()),
    };

    if metadata.file_type().is_symlink() {
        debug!(path = %path.display(), "Removing symlink, target untouched");
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove symlink: {}", path.display()))?;
    } else if metadata.is_dir() {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
    } else {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove file: {}", path.display()))?;
    }
    Ok(())
}
