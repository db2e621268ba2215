//! extman - extension installation and dependency resolution engine
//!
//! extman is the install-side core of a CMS extension manager: given a
//! catalog of third-party extension packages with declared version,
//! dependency, conflict and suggestion constraints, it computes a consistent
//! install set, downloads and unpacks package archives, writes package
//! metadata, and activates packages, while one-time setup imports stay
//! guarded by a durable execution ledger.
//!
//! # Architecture Overview
//!
//! The engine is split along the data flow:
//! - The **catalog** is the known universe of extension versions, populated
//!   by an external sync step and persisted locally.
//! - The **resolver** walks depends/conflicts/suggests edges transitively
//!   against the catalog and the installed set, producing a
//!   [`resolver::ResolutionPlan`] that either orders new installs
//!   dependency-first or fails closed with structured conflict and
//!   unresolvable reports.
//! - The **installer** executes a plan package by package: archive fetch and
//!   checksum verification, unpack into a freshly cleared directory,
//!   metadata merge, activation, then setup imports that run at most once
//!   per key thanks to the [`ledger`].
//!
//! Everything the surrounding system owns (activation state, caches, schema
//! migration, seed data sinks) is reached through the traits in
//! [`providers`]; file-backed implementations make the CLI operational
//! against a plain directory tree.
//!
//! # Core Modules
//!
//! ## Resolution
//! - [`version`] - Version triples and range constraints
//! - [`catalog`] - Indexed extension versions with current-version tracking
//! - [`installed`] - Snapshot of the active packages and their constraints
//! - [`resolver`] - Plan construction, conflict detection, install ordering
//!
//! ## Installation
//! - [`installer`] - The install/uninstall state machine and per-key locking
//! - [`fetch`] - Archive download from an HTTP or local mirror
//! - [`archive`] - Zip extraction with traversal protection
//! - [`pkgdir`] - Atomic clear and recreate of package directories
//! - [`metadata`] - The per-package `extension.toml`, merged on rewrite
//! - [`ledger`] - Durable at-most-once markers for setup imports
//!
//! ## Supporting Modules
//! - [`cli`] - Command-line interface
//! - [`config`] - Directory layout, mirror settings, installation policy
//! - [`core`] - Error types and user-facing error contexts
//! - [`providers`] - Collaborator traits and file-backed defaults
//! - [`utils`] - Filesystem helpers, hashing, key validation
//!
//! # Example
//!
//! ```rust,no_run
//! use extman::catalog::Catalog;
//! use extman::installed::InstalledPackageSet;
//! use extman::resolver::Resolver;
//!
//! # fn main() -> anyhow::Result<()> {
//! let catalog = Catalog::load("/srv/extman/state/catalog.toml".as_ref())?;
//! let installed = InstalledPackageSet::new();
//!
//! let plan = Resolver::new(&catalog, &installed).resolve("news", None)?;
//! for entry in &plan.ordered_install_set {
//!     println!("would install {} {}", entry.extension_key, entry.version);
//! }
//! # Ok(())
//! # }
//! ```

// Resolution
pub mod catalog;
pub mod installed;
pub mod resolver;
pub mod version;

// Installation
pub mod archive;
pub mod fetch;
pub mod installer;
pub mod ledger;
pub mod metadata;
pub mod pkgdir;

// Supporting modules
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod providers;
pub mod utils;
