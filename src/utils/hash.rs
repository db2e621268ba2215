//! Content hashing helpers.
//!
//! Package archives are verified against the catalog's recorded hash before
//! unpacking, and static SQL seeds are keyed in the ledger by their content
//! hash so a changed file is re-imported while an unchanged one is skipped.

use sha2::{Digest, Sha256};

/// SHA-256 of a byte slice, lowercase hex.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
