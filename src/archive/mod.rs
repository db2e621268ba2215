//! Package archive handling: unpack downloaded zip archives into a package
//! directory.
//!
//! Mirror archives come in two shapes, flat or wrapped in a single top-level
//! directory. Extraction normalizes both so the package files always land
//! directly in the destination. Entry paths are sanitized through the zip
//! crate's enclosed-name check, so an archive cannot write outside its
//! destination.

use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use zip::ZipArchive;

use crate::core::ExtmanError;

/// Unpack `bytes` into `dest`, which must already exist.
///
/// Returns the number of files written. Unreadable archives surface as
/// [`ExtmanError::CorruptArchive`]; entries with unsafe paths are skipped.
pub fn extract(extension_key: &str, bytes: &[u8], dest: &Path) -> Result<usize> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtmanError::CorruptArchive {
            extension_key: extension_key.to_string(),
            reason: e.to_string(),
        })?;

    if archive.is_empty() {
        return Err(ExtmanError::CorruptArchive {
            extension_key: extension_key.to_string(),
            reason: "archive is empty".to_string(),
        }
        .into());
    }

    let strip_root = common_root(&mut archive, extension_key)?;
    let mut written = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| ExtmanError::CorruptArchive {
            extension_key: extension_key.to_string(),
            reason: format!("entry {i}: {e}"),
        })?;

        let Some(entry_path) = entry.enclosed_name() else {
            debug!(extension_key, index = i, "Skipping entry with unsafe path");
            continue;
        };
        let Some(relative) = strip(&entry_path, strip_root.as_deref()) else {
            continue;
        };

        let full_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&full_path).with_context(|| {
                format!("Failed to create directory: {}", full_path.display())
            })?;
        } else {
            if let Some(parent) = full_path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory: {}", parent.display())
                })?;
            }
            let mut dest_file = std::fs::File::create(&full_path)
                .with_context(|| format!("Failed to create file: {}", full_path.display()))?;
            std::io::copy(&mut entry, &mut dest_file)
                .with_context(|| format!("Failed to extract file: {}", full_path.display()))?;
            written += 1;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                if let Err(e) =
                    std::fs::set_permissions(&full_path, std::fs::Permissions::from_mode(mode))
                {
                    debug!(path = %full_path.display(), "Failed to set permissions: {e}");
                }
            }
        }
    }

    debug!(extension_key, files = written, "Archive unpacked");
    Ok(written)
}

/// The single top-level directory shared by every entry, if there is one.
fn common_root(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    extension_key: &str,
) -> Result<Option<PathBuf>> {
    let mut root: Option<PathBuf> = None;

    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(|e| ExtmanError::CorruptArchive {
            extension_key: extension_key.to_string(),
            reason: format!("entry {i}: {e}"),
        })?;
        let Some(path) = entry.enclosed_name() else {
            continue;
        };

        let mut components = path.components();
        let Some(Component::Normal(first)) = components.next() else {
            return Ok(None);
        };
        // A top-level file means the archive is flat.
        if components.next().is_none() && !entry.is_dir() {
            return Ok(None);
        }

        match &root {
            None => root = Some(PathBuf::from(first)),
            Some(existing) if existing.as_os_str() == first => {}
            Some(_) => return Ok(None),
        }
    }

    Ok(root)
}

/// Strip the wrapping root from an entry path; `None` drops the entry (the
/// bare root directory itself).
fn strip(path: &Path, root: Option<&Path>) -> Option<PathBuf> {
    match root {
        None => Some(path.to_path_buf()),
        Some(root) => {
            let stripped = path.strip_prefix(root).ok()?;
            if stripped.as_os_str().is_empty() {
                None
            } else {
                Some(stripped.to_path_buf())
            }
        }
    }
}

/// Build a zip archive from (path, content) pairs. Test fixture support.
#[cfg(any(test, feature = "test-utils"))]
pub fn pack(files: &[(&str, &str)]) -> Vec<u8> {
    use std::io::Write;
    use zip::CompressionMethod;
    use zip::ZipWriter;
    use zip::write::FileOptions;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions<'_, ()> =
        FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, content) in files {
        zip.start_file(*name, options).expect("start zip entry");
        zip.write_all(content.as_bytes()).expect("write zip entry");
    }

    zip.finish().expect("finish zip").into_inner()
}
