//! File system utilities shared across the crate.
//!
//! All state files (catalog, ledger, activation state, metadata) go through
//! [`atomic_write`]: content lands in a temporary file that is synced and then
//! renamed over the target, so readers never observe a partially written
//! file. Directory trees are copied with [`copy_dir_recursive`] for seed and
//! site-configuration imports.
//!
//! # Examples
//!
//! ```rust
//! use extman::utils::fs::{ensure_dir, safe_write};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! ensure_dir(Path::new("state/.locks"))?;
//! safe_write(Path::new("state/active.toml"), "[extensions]\n")?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Ensures a directory exists, creating it and all parent directories if
/// necessary.
///
/// Returns an error if the path exists but is not a directory.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!(
            "Path exists but is not a directory: {}",
            path.display()
        ));
    }
    Ok(())
}

/// Safely writes a string to a file using atomic operations.
///
/// Convenience wrapper around [`atomic_write`] for string content.
pub fn safe_write(path: &Path, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}

/// Atomically writes bytes to a file using a write-then-rename strategy.
///
/// 1. Writes content to a named temporary file in the target's directory
/// 2. Syncs the temporary file to disk
/// 3. Persists (renames) the temporary file over the target path
///
/// Parent directories are created automatically. Interrupted writes leave the
/// previous file intact.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    ensure_dir(parent)?;

    // Same directory as the target so the final rename never crosses a
    // filesystem boundary.
    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary file in: {}", parent.display()))?;
    temp.write_all(content)
        .with_context(|| format!("Failed to write temporary file for: {}", path.display()))?;
    temp.as_file()
        .sync_all()
        .with_context(|| format!("Failed to sync temporary file for: {}", path.display()))?;

    temp.persist(path)
        .with_context(|| format!("Failed to move temporary file into place: {}", path.display()))?;

    Ok(())
}

/// Recursively copies a directory tree, preserving relative layout.
///
/// Existing files at the destination are overwritten; directories are merged.
/// Returns the number of files copied.
pub fn copy_dir_recursive(source: &Path, dest: &Path) -> Result<usize> {
    if !source.is_dir() {
        return Err(anyhow::anyhow!(
            "Copy source is not a directory: {}",
            source.display()
        ));
    }
    ensure_dir(dest)?;

    let mut copied = 0;
    for entry in WalkDir::new(source) {
        let entry = entry
            .with_context(|| format!("Failed to walk directory: {}", source.display()))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .with_context(|| format!("Path escapes copy source: {}", entry.path().display()))?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                ensure_dir(parent)?;
            }
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "Failed to copy {} -> {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
            copied += 1;
        }
        // Symlinks inside seed trees are skipped rather than followed.
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_dir_creates_nested() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a/b/c");

        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());

        // Idempotent
        ensure_dir(&nested).unwrap();
    }

    #[test]
    fn test_ensure_dir_rejects_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "content").unwrap();

        assert!(ensure_dir(&file).is_err());
    }

    #[test]
    fn test_atomic_write_creates_parents_and_content() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("sub/dir/state.toml");

        atomic_write(&target, b"key = 1\n").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "key = 1\n");

        // No leftover temp file next to the target
        assert_eq!(fs::read_dir(target.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_atomic_write_replaces_existing() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("state.toml");

        safe_write(&target, "old").unwrap();
        safe_write(&target, "new").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }

    #[test]
    fn test_copy_dir_recursive() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src");
        let dest = temp.path().join("dst");

        fs::create_dir_all(source.join("nested")).unwrap();
        fs::write(source.join("top.txt"), "top").unwrap();
        fs::write(source.join("nested/inner.txt"), "inner").unwrap();

        let copied = copy_dir_recursive(&source, &dest).unwrap();
        assert_eq!(copied, 2);
        assert_eq!(fs::read_to_string(dest.join("top.txt")).unwrap(), "top");
        assert_eq!(
            fs::read_to_string(dest.join("nested/inner.txt")).unwrap(),
            "inner"
        );
    }

    #[test]
    fn test_copy_dir_recursive_merges_into_existing() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src");
        let dest = temp.path().join("dst");

        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&dest).unwrap();
        fs::write(source.join("new.txt"), "new").unwrap();
        fs::write(dest.join("existing.txt"), "keep").unwrap();

        copy_dir_recursive(&source, &dest).unwrap();
        assert!(dest.join("new.txt").exists());
        assert_eq!(fs::read_to_string(dest.join("existing.txt")).unwrap(), "keep");
    }

    #[test]
    fn test_copy_dir_recursive_rejects_file_source() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "content").unwrap();

        assert!(copy_dir_recursive(&file, &temp.path().join("dst")).is_err());
    }
}
