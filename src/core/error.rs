//! Error handling for extman
//!
//! This module provides the error types and user-friendly error reporting for the
//! extension manager. The error system is designed around two core principles:
//! 1. **Strongly-typed errors** for precise error handling in code
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Architecture
//!
//! The error system consists of two main types:
//! - [`ExtmanError`] - Enumerated error types for all failure cases in extman
//! - [`ErrorContext`] - Wrapper that adds user-friendly messages and suggestions
//!
//! # Error Categories
//!
//! Errors are organized into several categories:
//! - **Versions and ranges**: [`ExtmanError::InvalidVersion`], [`ExtmanError::InvalidVersionRange`]
//! - **Resolution**: [`ExtmanError::UnresolvableDependency`], [`ExtmanError::Conflict`],
//!   [`ExtmanError::DependencyBlocked`]
//! - **Transfer**: [`ExtmanError::DownloadFailed`], [`ExtmanError::ChecksumMismatch`],
//!   [`ExtmanError::CorruptArchive`]
//! - **File System**: [`ExtmanError::DirectoryOperation`], [`ExtmanError::IoError`]
//! - **Catalog**: [`ExtmanError::ExtensionNotFound`], [`ExtmanError::VersionNotFound`]
//!
//! # Error Conversion and Context
//!
//! Common standard library errors are automatically converted:
//! - [`std::io::Error`] → [`ExtmanError::IoError`]
//! - [`toml::de::Error`] → [`ExtmanError::TomlError`]
//! - [`serde_json::Error`] → [`ExtmanError::JsonError`]
//!
//! Use [`user_friendly_error`] to convert any error into a user-friendly format with
//! contextual suggestions.
//!
//! # Examples
//!
//! ```rust,no_run
//! use extman::core::{ExtmanError, user_friendly_error};
//!
//! fn activate_extension() -> Result<(), ExtmanError> {
//!     Err(ExtmanError::ExtensionNotFound {
//!         extension_key: "news".to_string(),
//!     })
//! }
//!
//! match activate_extension() {
//!     Ok(()) => println!("Done"),
//!     Err(e) => {
//!         let ctx = user_friendly_error(anyhow::Error::from(e));
//!         ctx.display(); // Shows colored error with suggestions
//!     }
//! }
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for extman operations
///
/// Each variant represents a specific failure mode and carries the context a
/// caller needs to react: the extension key involved, the offending input, or
/// the path that failed. Resolution-level outcomes (conflicts, unresolvable
/// dependencies) also appear as data inside a resolution plan; the error
/// variants here are what callers receive when an operation is refused
/// outright.
///
/// # Examples
///
/// ```rust,no_run
/// use extman::core::ExtmanError;
///
/// fn handle_error(error: &ExtmanError) {
///     match error {
///         ExtmanError::DependencyBlocked { extension_key, blockers } => {
///             eprintln!("Cannot remove {extension_key}: still required by {blockers:?}");
///         }
///         ExtmanError::UnresolvableDependency { extension_key, reason } => {
///             eprintln!("No usable version of {extension_key}: {reason}");
///         }
///         other => eprintln!("{other}"),
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum ExtmanError {
    /// Malformed version string
    ///
    /// Versions are plain triples ("1.2.0"); missing segments default to zero,
    /// anything non-numeric is rejected here instead of being coerced.
    #[error("Invalid version '{input}': {reason}")]
    InvalidVersion {
        /// The version string that failed to parse
        input: String,
        /// Why parsing rejected it
        reason: String,
    },

    /// Malformed version range string
    ///
    /// Ranges are "" (any), "1.2.0" (floor only) or "1.2.0-2.0.0"
    /// (floor-ceiling). A floor above the ceiling is rejected at parse time,
    /// never silently swapped.
    #[error("Invalid version range '{input}': {reason}")]
    InvalidVersionRange {
        /// The range string that failed to parse
        input: String,
        /// Why parsing rejected it
        reason: String,
    },

    /// Malformed extension key
    #[error("Invalid extension key '{key}': {reason}")]
    InvalidExtensionKey {
        /// The offending key
        key: String,
        /// Why validation rejected it
        reason: String,
    },

    /// No catalog version satisfies a required dependency range
    #[error("Cannot resolve dependency '{extension_key}': {reason}")]
    UnresolvableDependency {
        /// Key of the dependency that could not be satisfied
        extension_key: String,
        /// Why no version qualified
        reason: String,
    },

    /// A declared conflict matches an installed extension
    #[error("Extension '{extension_key}' conflicts with installed extension '{conflicting_key}'")]
    Conflict {
        /// Key of the extension being resolved
        extension_key: String,
        /// Key of the installed extension it conflicts with
        conflicting_key: String,
    },

    /// Uninstall refused because installed extensions still depend on the target
    #[error("Cannot uninstall '{extension_key}': still required by {}", blockers.join(", "))]
    DependencyBlocked {
        /// Key of the extension the caller tried to remove
        extension_key: String,
        /// Installed extensions that declare a dependency on it
        blockers: Vec<String>,
    },

    /// Extension key unknown to the catalog
    #[error("Extension '{extension_key}' not found in catalog")]
    ExtensionNotFound {
        /// The unknown extension key
        extension_key: String,
    },

    /// Version not present in the catalog for this extension
    #[error("Version '{version}' not found for extension '{extension_key}'")]
    VersionNotFound {
        /// Key of the extension
        extension_key: String,
        /// The version string that could not be found
        version: String,
    },

    /// Package archive download failed
    #[error("Download failed for '{extension_key}' {version}: {reason}")]
    DownloadFailed {
        /// Key of the extension being fetched
        extension_key: String,
        /// Version being fetched
        version: String,
        /// Transport-level reason
        reason: String,
    },

    /// Downloaded archive does not match the catalog hash
    #[error("Checksum mismatch for '{extension_key}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Key of the extension whose archive failed verification
        extension_key: String,
        /// The hash recorded in the catalog
        expected: String,
        /// The hash computed from the downloaded bytes
        actual: String,
    },

    /// Package archive could not be unpacked
    #[error("Corrupt archive for '{extension_key}': {reason}")]
    CorruptArchive {
        /// Key of the extension whose archive is unreadable
        extension_key: String,
        /// What the archive reader reported
        reason: String,
    },

    /// A directory create/clear/remove did not leave the expected state behind
    ///
    /// Raised from post-condition checks, not from the removal call's return
    /// value: after an ensure-clean the path must be a directory, and a failed
    /// check surfaces here.
    #[error("Directory operation failed on '{path}': {reason}")]
    DirectoryOperation {
        /// Path the operation ran against
        path: String,
        /// Which post-condition was violated
        reason: String,
    },

    /// Could not acquire the per-extension operation lock in time
    #[error("Timed out waiting for the operation lock on '{extension_key}' after {timeout_secs}s")]
    LockTimeout {
        /// Key whose lock could not be acquired
        extension_key: String,
        /// How long acquisition was attempted
        timeout_secs: u64,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// Persisted state file (catalog, ledger, activation state) failed to parse
    #[error("Invalid state file '{file}': {reason}")]
    StateParseError {
        /// Path of the unreadable state file
        file: String,
        /// Parser diagnostic
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    /// JSON parsing error (catalog snapshots)
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl Clone for ExtmanError {
    fn clone(&self) -> Self {
        match self {
            Self::InvalidVersion { input, reason } => Self::InvalidVersion {
                input: input.clone(),
                reason: reason.clone(),
            },
            Self::InvalidVersionRange { input, reason } => Self::InvalidVersionRange {
                input: input.clone(),
                reason: reason.clone(),
            },
            Self::InvalidExtensionKey { key, reason } => Self::InvalidExtensionKey {
                key: key.clone(),
                reason: reason.clone(),
            },
            Self::UnresolvableDependency { extension_key, reason } => {
                Self::UnresolvableDependency {
                    extension_key: extension_key.clone(),
                    reason: reason.clone(),
                }
            }
            Self::Conflict { extension_key, conflicting_key } => Self::Conflict {
                extension_key: extension_key.clone(),
                conflicting_key: conflicting_key.clone(),
            },
            Self::DependencyBlocked { extension_key, blockers } => Self::DependencyBlocked {
                extension_key: extension_key.clone(),
                blockers: blockers.clone(),
            },
            Self::ExtensionNotFound { extension_key } => Self::ExtensionNotFound {
                extension_key: extension_key.clone(),
            },
            Self::VersionNotFound { extension_key, version } => Self::VersionNotFound {
                extension_key: extension_key.clone(),
                version: version.clone(),
            },
            Self::DownloadFailed { extension_key, version, reason } => Self::DownloadFailed {
                extension_key: extension_key.clone(),
                version: version.clone(),
                reason: reason.clone(),
            },
            Self::ChecksumMismatch { extension_key, expected, actual } => {
                Self::ChecksumMismatch {
                    extension_key: extension_key.clone(),
                    expected: expected.clone(),
                    actual: actual.clone(),
                }
            }
            Self::CorruptArchive { extension_key, reason } => Self::CorruptArchive {
                extension_key: extension_key.clone(),
                reason: reason.clone(),
            },
            Self::DirectoryOperation { path, reason } => Self::DirectoryOperation {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::LockTimeout { extension_key, timeout_secs } => Self::LockTimeout {
                extension_key: extension_key.clone(),
                timeout_secs: *timeout_secs,
            },
            Self::ConfigError { message } => Self::ConfigError {
                message: message.clone(),
            },
            Self::StateParseError { file, reason } => Self::StateParseError {
                file: file.clone(),
                reason: reason.clone(),
            },
            // For errors that don't implement Clone, convert to Other
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::TomlError(e) => Self::Other {
                message: format!("TOML parsing error: {e}"),
            },
            Self::TomlSerError(e) => Self::Other {
                message: format!("TOML serialization error: {e}"),
            },
            Self::JsonError(e) => Self::Other {
                message: format!("JSON parsing error: {e}"),
            },
            Self::Other { message } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// Wraps an [`ExtmanError`] and adds optional suggestions and details. This is
/// the form errors take when they reach the terminal: the error itself in red,
/// details in yellow, an actionable suggestion in green.
///
/// # Examples
///
/// ```rust,no_run
/// use extman::core::{ExtmanError, ErrorContext};
///
/// let context = ErrorContext::new(ExtmanError::ExtensionNotFound {
///     extension_key: "news".to_string(),
/// })
/// .with_suggestion("Import a catalog snapshot first: extman catalog import <file>")
/// .with_details("The catalog has no versions recorded for this key");
///
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: ExtmanError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context from an [`ExtmanError`]
    #[must_use]
    pub const fn new(error: ExtmanError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    ///
    /// Suggestions should be actionable steps; they are displayed in green to
    /// draw attention.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    ///
    /// - Error message: red and bold
    /// - Details: yellow
    /// - Suggestion: green
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// This function is the main entry point for converting arbitrary errors into
/// user-friendly messages for CLI display. It recognizes [`ExtmanError`]
/// variants and common [`std::io::Error`] kinds and attaches tailored
/// suggestions; anything else is passed through with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(extman_error) = error.downcast_ref::<ExtmanError>() {
        return create_error_context(extman_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(ExtmanError::DirectoryOperation {
                    path: "unknown".to_string(),
                    reason: "permission denied".to_string(),
                })
                .with_suggestion(
                    "Check ownership of the extension, state and cache directories, or re-run with sufficient permissions",
                )
                .with_details("extman could not read or write one of its managed directories");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(ExtmanError::DirectoryOperation {
                    path: "unknown".to_string(),
                    reason: "file or directory not found".to_string(),
                })
                .with_suggestion("Check that the path exists and the configuration points at the right root directory")
                .with_details("A required file or directory could not be found");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(ExtmanError::StateParseError {
            file: "extman.toml".to_string(),
            reason: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax: quotes, brackets and table headers")
        .with_details("TOML parsing errors are usually caused by syntax issues like missing quotes or mismatched brackets");
    }

    // Generic error - include the full error chain for better diagnostics
    let mut message = error.to_string();

    let chain: Vec<String> = error
        .chain()
        .skip(1) // Skip the root cause which is already in to_string()
        .map(std::string::ToString::to_string)
        .collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(ExtmanError::Other { message })
}

/// Create appropriate [`ErrorContext`] with suggestions for specific errors
///
/// Maps each [`ExtmanError`] variant to a context with tailored suggestions
/// and details. Used by [`user_friendly_error`] to keep CLI messages
/// consistent.
fn create_error_context(error: ExtmanError) -> ErrorContext {
    match &error {
        ExtmanError::UnresolvableDependency { extension_key, .. } => {
            ErrorContext::new(error.clone())
                .with_suggestion(format!(
                    "Import a newer catalog snapshot ('extman catalog import') or relax the constraint on '{extension_key}'"
                ))
                .with_details("No version in the catalog satisfies the declared dependency range")
        }

        ExtmanError::Conflict { conflicting_key, .. } => ErrorContext::new(error.clone())
            .with_suggestion(format!(
                "Uninstall '{conflicting_key}' first, or install a version without the declared conflict"
            ))
            .with_details("Declared conflicts are never installed around; the plan fails closed"),

        ExtmanError::DependencyBlocked { blockers, .. } => ErrorContext::new(error.clone())
            .with_suggestion(format!("Uninstall {} first", blockers.join(", ")))
            .with_details("Installed extensions still declare a dependency on the target"),

        ExtmanError::ExtensionNotFound { extension_key } => ErrorContext::new(error.clone())
            .with_suggestion(format!(
                "Check the spelling of '{extension_key}' or import a catalog snapshot: extman catalog import <file>"
            ))
            .with_details("The catalog has no versions recorded for this key"),

        ExtmanError::DownloadFailed { .. } => ErrorContext::new(error.clone())
            .with_suggestion(
                "Check the mirror URL in the configuration and your network connection; a local mirror path works offline",
            )
            .with_details("The package archive could not be fetched from the mirror"),

        ExtmanError::ChecksumMismatch { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Retry the download; if the mismatch persists, the mirror copy is corrupt")
            .with_details("The downloaded archive does not match the hash recorded in the catalog"),

        ExtmanError::CorruptArchive { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Retry the download or pick a different mirror")
            .with_details("The zip archive could not be read"),

        ExtmanError::InvalidVersion { .. } | ExtmanError::InvalidVersionRange { .. } => {
            ErrorContext::new(error.clone())
                .with_suggestion(
                    "Versions are MAJOR.MINOR.PATCH (missing segments default to 0); ranges are 'FLOOR' or 'FLOOR-CEILING'",
                )
        }

        ExtmanError::LockTimeout { extension_key, .. } => ErrorContext::new(error.clone())
            .with_suggestion(format!(
                "Another extman process is operating on '{extension_key}'; wait for it to finish and retry"
            ))
            .with_details("Install and uninstall hold a per-extension lock so directory operations never interleave"),

        ExtmanError::DirectoryOperation { path, .. } => ErrorContext::new(error.clone())
            .with_suggestion("Check permissions and that no other process holds files open under the path")
            .with_details(format!("The expected directory state at {path} could not be produced")),

        _ => ErrorContext::new(error.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ExtmanError::ExtensionNotFound {
            extension_key: "news".to_string(),
        };
        assert_eq!(error.to_string(), "Extension 'news' not found in catalog");

        let error = ExtmanError::InvalidVersionRange {
            input: "2.0.0-1.0.0".to_string(),
            reason: "floor exceeds ceiling".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid version range '2.0.0-1.0.0': floor exceeds ceiling"
        );

        let error = ExtmanError::DependencyBlocked {
            extension_key: "lang".to_string(),
            blockers: vec!["news".to_string(), "blog".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "Cannot uninstall 'lang': still required by news, blog"
        );

        let error = ExtmanError::Conflict {
            extension_key: "newbase".to_string(),
            conflicting_key: "oldbase".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Extension 'newbase' conflicts with installed extension 'oldbase'"
        );
    }

    #[test]
    fn test_error_context() {
        let ctx = ErrorContext::new(ExtmanError::ExtensionNotFound {
            extension_key: "news".to_string(),
        })
        .with_suggestion("Import a catalog snapshot")
        .with_details("The catalog is empty");

        assert_eq!(ctx.suggestion, Some("Import a catalog snapshot".to_string()));
        assert_eq!(ctx.details, Some("The catalog is empty".to_string()));
    }

    #[test]
    fn test_error_context_display() {
        let ctx = ErrorContext::new(ExtmanError::ExtensionNotFound {
            extension_key: "news".to_string(),
        })
        .with_suggestion("Import a catalog snapshot");

        let display = format!("{ctx}");
        assert!(display.contains("Extension 'news' not found"));
        assert!(display.contains("Import a catalog snapshot"));
    }

    #[test]
    fn test_user_friendly_error_permission_denied() {
        use std::io::{Error, ErrorKind};

        let io_error = Error::new(ErrorKind::PermissionDenied, "access denied");
        let anyhow_error = anyhow::Error::from(io_error);

        let ctx = user_friendly_error(anyhow_error);
        match ctx.error {
            ExtmanError::DirectoryOperation { .. } => {}
            _ => panic!("Expected DirectoryOperation error"),
        }
        assert!(ctx.suggestion.is_some());
        assert!(ctx.details.is_some());
    }

    #[test]
    fn test_user_friendly_error_extman_error() {
        let error = ExtmanError::DependencyBlocked {
            extension_key: "lang".to_string(),
            blockers: vec!["news".to_string()],
        };
        let ctx = user_friendly_error(anyhow::Error::from(error));

        match &ctx.error {
            ExtmanError::DependencyBlocked { blockers, .. } => {
                assert_eq!(blockers, &["news".to_string()]);
            }
            _ => panic!("Expected DependencyBlocked"),
        }
        assert!(ctx.suggestion.unwrap().contains("news"));
    }

    #[test]
    fn test_user_friendly_error_toml_parse() {
        let toml_str = "invalid = toml {";
        let result: Result<toml::Value, _> = toml::from_str(toml_str);

        if let Err(e) = result {
            let ctx = user_friendly_error(anyhow::Error::from(e));
            match ctx.error {
                ExtmanError::StateParseError { .. } => {}
                _ => panic!("Expected StateParseError"),
            }
            assert!(ctx.suggestion.unwrap().contains("TOML syntax"));
        }
    }

    #[test]
    fn test_user_friendly_error_generic() {
        let error = anyhow::anyhow!("Generic error");
        let ctx = user_friendly_error(error);

        match ctx.error {
            ExtmanError::Other { message } => assert_eq!(message, "Generic error"),
            _ => panic!("Expected Other error"),
        }
    }

    #[test]
    fn test_user_friendly_error_includes_chain() {
        use anyhow::Context;

        let root: anyhow::Result<()> = Err(anyhow::anyhow!("root cause"));
        let error = root.context("outer context").unwrap_err();
        let ctx = user_friendly_error(error);

        match ctx.error {
            ExtmanError::Other { message } => {
                assert!(message.contains("outer context"));
                assert!(message.contains("Caused by"));
                assert!(message.contains("root cause"));
            }
            _ => panic!("Expected Other error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        use std::io::Error;

        let io_error = Error::other("test error");
        let extman_error = ExtmanError::from(io_error);

        match extman_error {
            ExtmanError::IoError(_) => {}
            _ => panic!("Expected IoError"),
        }
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml {";
        let result: Result<toml::Value, _> = toml::from_str(toml_str);

        if let Err(e) = result {
            let extman_error = ExtmanError::from(e);
            match extman_error {
                ExtmanError::TomlError(_) => {}
                _ => panic!("Expected TomlError"),
            }
        }
    }

    #[test]
    fn test_create_error_context_unresolvable() {
        let ctx = create_error_context(ExtmanError::UnresolvableDependency {
            extension_key: "lang".to_string(),
            reason: "no version satisfies 2.0.0-3.0.0".to_string(),
        });
        assert!(ctx.suggestion.is_some());
        assert!(ctx.suggestion.unwrap().contains("lang"));
        assert!(ctx.details.is_some());
    }

    #[test]
    fn test_create_error_context_conflict() {
        let ctx = create_error_context(ExtmanError::Conflict {
            extension_key: "newbase".to_string(),
            conflicting_key: "oldbase".to_string(),
        });
        assert!(ctx.suggestion.unwrap().contains("oldbase"));
        assert!(ctx.details.unwrap().contains("fails closed"));
    }

    #[test]
    fn test_create_error_context_checksum_mismatch() {
        let ctx = create_error_context(ExtmanError::ChecksumMismatch {
            extension_key: "news".to_string(),
            expected: "abc123".to_string(),
            actual: "def456".to_string(),
        });
        assert!(ctx.suggestion.is_some());
        assert!(ctx.details.unwrap().contains("hash recorded in the catalog"));
    }

    #[test]
    fn test_create_error_context_lock_timeout() {
        let ctx = create_error_context(ExtmanError::LockTimeout {
            extension_key: "news".to_string(),
            timeout_secs: 120,
        });
        assert!(ctx.suggestion.unwrap().contains("news"));
        assert!(ctx.details.is_some());
    }

    #[test]
    fn test_error_clone() {
        let error1 = ExtmanError::ExtensionNotFound {
            extension_key: "news".to_string(),
        };
        let error2 = error1.clone();
        assert_eq!(error1.to_string(), error2.to_string());

        let error1 = ExtmanError::from(std::io::Error::other("disk"));
        let error2 = error1.clone();
        // Non-cloneable sources degrade to Other with the same message
        assert!(error2.to_string().contains("disk"));
    }

    #[test]
    fn test_error_display_all_variants() {
        let errors = vec![
            ExtmanError::InvalidVersion {
                input: "a.b.c".to_string(),
                reason: "non-numeric segment".to_string(),
            },
            ExtmanError::InvalidExtensionKey {
                key: "News!".to_string(),
                reason: "uppercase".to_string(),
            },
            ExtmanError::VersionNotFound {
                extension_key: "news".to_string(),
                version: "9.9.9".to_string(),
            },
            ExtmanError::DownloadFailed {
                extension_key: "news".to_string(),
                version: "1.0.0".to_string(),
                reason: "connection refused".to_string(),
            },
            ExtmanError::CorruptArchive {
                extension_key: "news".to_string(),
                reason: "not a zip".to_string(),
            },
            ExtmanError::DirectoryOperation {
                path: "/srv/ext/news".to_string(),
                reason: "not a directory after create".to_string(),
            },
            ExtmanError::ConfigError {
                message: "mirror url missing".to_string(),
            },
            ExtmanError::StateParseError {
                file: "catalog.toml".to_string(),
                reason: "syntax".to_string(),
            },
        ];

        for error in errors {
            let display = format!("{error}");
            assert!(!display.is_empty());
        }
    }
}
