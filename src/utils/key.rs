//! Extension key validation.
//!
//! Extension keys are the identity half of every catalog row and the name of
//! the on-disk package directory, so they are validated before anything is
//! inserted or any path is computed: lowercase letters, digits and
//! underscores, 3 to 30 characters, starting with a letter. A handful of
//! prefixes are reserved for the host system's own tables.

use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;

use crate::core::ExtmanError;

/// Prefixes reserved for host-system namespaces; never valid as extension keys.
const RESERVED_PREFIXES: &[&str] = &["tx_", "sys_", "user_", "pages_"];

fn key_regex() -> &'static Regex {
    static KEY_REGEX: OnceLock<Regex> = OnceLock::new();
    KEY_REGEX.get_or_init(|| {
        Regex::new(r"^[a-z][a-z0-9_]{2,29}$").expect("extension key regex is valid")
    })
}

/// Validate an extension key, returning it on success.
///
/// # Errors
///
/// [`ExtmanError::InvalidExtensionKey`] with the violated rule as reason.
pub fn validate_extension_key(key: &str) -> Result<&str> {
    if !key_regex().is_match(key) {
        return Err(ExtmanError::InvalidExtensionKey {
            key: key.to_string(),
            reason: "keys are 3-30 characters of [a-z0-9_], starting with a letter".to_string(),
        }
        .into());
    }

    for prefix in RESERVED_PREFIXES {
        if key.starts_with(prefix) {
            return Err(ExtmanError::InvalidExtensionKey {
                key: key.to_string(),
                reason: format!("prefix '{prefix}' is reserved"),
            }
            .into());
        }
    }

    Ok(key)
}
