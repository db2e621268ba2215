//! Shared utilities: atomic file operations, content hashing and extension
//! key validation.

pub mod fs;
pub mod hash;
pub mod key;

pub use fs::{atomic_write, copy_dir_recursive, ensure_dir, safe_write};
pub use hash::sha256_hex;
pub use key::validate_extension_key;
