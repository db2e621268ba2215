//! Archive download: fetch package archives from a mirror.
//!
//! Mirrors shard archives by the first two characters of the lowercased
//! extension key: `{mirror}/{k[0]}/{k[1]}/{key}_{version}.zip`. Two fetchers
//! exist behind one type: an HTTP client with retry and timeout, and a plain
//! directory in the same layout for offline use and tests.
//!
//! Transport failures surface as [`ExtmanError::DownloadFailed`]; checksum
//! verification against the catalog's content hash lives in [`verify`] and
//! reports [`ExtmanError::ChecksumMismatch`].

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tokio_retry::RetryIf;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{debug, warn};

use crate::constants::{
    DOWNLOAD_RETRY_ATTEMPTS, MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS,
};
use crate::core::ExtmanError;
use crate::utils::hash::sha256_hex;
use crate::version::Version;

/// Archive file name for one extension version.
#[must_use]
pub fn archive_filename(extension_key: &str, version: &Version) -> String {
    format!("{}_{version}.zip", extension_key.to_lowercase())
}

/// Mirror-relative path of one archive, with the two shard directories.
#[must_use]
pub fn mirror_path(extension_key: &str, version: &Version) -> String {
    let key = extension_key.to_lowercase();
    let mut chars = key.chars();
    let first = chars.next().unwrap_or('_');
    let second = chars.next().unwrap_or('_');
    format!("{first}/{second}/{}", archive_filename(&key, version))
}

/// Downloads package archives from an HTTP mirror or a local directory.
#[derive(Debug, Clone)]
pub struct Fetcher {
    kind: FetchKind,
}

#[derive(Debug, Clone)]
enum FetchKind {
    Http { client: reqwest::Client, base_url: String },
    LocalMirror { dir: PathBuf },
}

/// One failed download attempt; retryable attempts go through the backoff.
struct AttemptError {
    reason: String,
    retryable: bool,
}

impl AttemptError {
    fn retryable(reason: impl Into<String>) -> Self {
        Self { reason: reason.into(), retryable: true }
    }

    fn fatal(reason: impl Into<String>) -> Self {
        Self { reason: reason.into(), retryable: false }
    }
}

impl Fetcher {
    /// HTTP fetcher against `base_url` with a per-request timeout.
    pub fn http(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExtmanError::ConfigError {
                message: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            kind: FetchKind::Http { client, base_url: base_url.into() },
        })
    }

    /// Fetcher reading from a mirror-layout directory on disk.
    #[must_use]
    pub fn local_mirror(dir: impl Into<PathBuf>) -> Self {
        Self { kind: FetchKind::LocalMirror { dir: dir.into() } }
    }

    /// Fetch the archive bytes for one extension version.
    pub async fn fetch(&self, extension_key: &str, version: &Version) -> Result<Vec<u8>> {
        match &self.kind {
            FetchKind::Http { client, base_url } => {
                fetch_http(client, base_url, extension_key, version).await
            }
            FetchKind::LocalMirror { dir } => {
                let path = dir.join(mirror_path(extension_key, version));
                debug!(extension_key, path = %path.display(), "Reading archive from local mirror");
                tokio::fs::read(&path).await.map_err(|e| {
                    let reason = if e.kind() == std::io::ErrorKind::NotFound {
                        format!("archive not present in mirror: {}", path.display())
                    } else {
                        e.to_string()
                    };
                    ExtmanError::DownloadFailed {
                        extension_key: extension_key.to_string(),
                        version: version.to_string(),
                        reason,
                    }
                    .into()
                })
            }
        }
    }

}

async fn fetch_http(
    client: &reqwest::Client,
    base_url: &str,
    extension_key: &str,
    version: &Version,
) -> Result<Vec<u8>> {
    let url = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        mirror_path(extension_key, version)
    );
    debug!(extension_key, %url, "Downloading archive");

    let strategy = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
        .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS))
        .take(DOWNLOAD_RETRY_ATTEMPTS);

    let attempt = || async {
        let response = client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                AttemptError::retryable(e.to_string())
            } else {
                AttemptError::fatal(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_server_error() {
            warn!(extension_key, %status, "Mirror returned a server error, retrying");
            return Err(AttemptError::retryable(format!("server error: {status}")));
        }
        if !status.is_success() {
            return Err(AttemptError::fatal(format!("unexpected status: {status}")));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| AttemptError::retryable(e.to_string()))
    };

    RetryIf::spawn(strategy, attempt, |e: &AttemptError| e.retryable)
        .await
        .map_err(|e| {
            ExtmanError::DownloadFailed {
                extension_key: extension_key.to_string(),
                version: version.to_string(),
                reason: e.reason,
            }
            .into()
        })
}

/// Compare downloaded bytes against the catalog's content hash.
///
/// An empty expected hash skips verification: catalog feeds do not always
/// carry one.
pub fn verify(extension_key: &str, bytes: &[u8], expected_hash: &str) -> Result<()> {
    if expected_hash.is_empty() {
        debug!(extension_key, "No content hash in catalog, skipping verification");
        return Ok(());
    }

    let actual = sha256_hex(bytes);
    if !actual.eq_ignore_ascii_case(expected_hash) {
        return Err(ExtmanError::ChecksumMismatch {
            extension_key: extension_key.to_string(),
            expected: expected_hash.to_string(),
            actual,
        }
        .into());
    }
    Ok(())
}
