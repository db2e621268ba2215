//! Core types for extman
//!
//! The foundation of the crate's type system: the error enum every operation
//! reports through, and the user-facing error context used by the CLI.
//!
//! # Error Handling
//!
//! extman distinguishes two layers of failure reporting:
//! - **Strongly-typed errors** ([`ExtmanError`]) for precise handling in code,
//!   carried through `anyhow::Result` and recovered via `downcast_ref` where a
//!   caller needs to branch (a blocked uninstall, a conflict).
//! - **User-friendly contexts** ([`ErrorContext`]) with actionable suggestions,
//!   produced by [`user_friendly_error`] at the CLI boundary.
//!
//! Resolution-level outcomes are data, not exceptions: a resolution plan
//! carries its conflict and unresolvable maps so callers can distinguish a
//! hard stop from informational results without inspecting error types.

pub mod error;

pub use error::{ErrorContext, ExtmanError, user_friendly_error};
