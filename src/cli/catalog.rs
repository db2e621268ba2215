//! The `catalog` command: maintain the local catalog mirror.
//!
//! ```bash
//! extman catalog import snapshot.json
//! extman catalog show
//! extman catalog show news
//! ```
//!
//! `import` merges a JSON snapshot produced by the external sync step into
//! the persisted catalog and recomputes the current version per key.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::utils::validate_extension_key;

use super::Workspace;

/// Arguments for `extman catalog`.
#[derive(Args)]
pub struct CatalogCommand {
    #[command(subcommand)]
    command: CatalogSubcommand,
}

#[derive(Subcommand)]
enum CatalogSubcommand {
    /// Import a JSON snapshot of extension versions
    Import {
        /// Path to the snapshot file
        path: PathBuf,
    },
    /// Show known extensions, or every version of one extension
    Show {
        /// Extension key to show in detail
        key: Option<String>,
    },
}

impl CatalogCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let workspace = Workspace::load(config_path).await?;

        match self.command {
            CatalogSubcommand::Import { path } => {
                let imported = workspace.catalog.import_snapshot(&path)?;
                workspace.catalog.save(&workspace.config.catalog_path())?;
                println!(
                    "{} {imported} version(s); catalog now tracks {} extension(s)",
                    "Imported".green().bold(),
                    workspace.catalog.keys().len()
                );
            }
            CatalogSubcommand::Show { key: Some(key) } => {
                validate_extension_key(&key)?;
                let versions = workspace.catalog.versions_of(&key);
                if versions.is_empty() {
                    println!("'{key}' is not in the catalog");
                    return Ok(());
                }
                let current = workspace.catalog.current(&key).map(|e| e.version);
                for entry in versions {
                    let marker = if current == Some(entry.version) { " (current)" } else { "" };
                    println!("  {} {:?}{marker}", entry.version, entry.state);
                }
            }
            CatalogSubcommand::Show { key: None } => {
                let keys = workspace.catalog.keys();
                if keys.is_empty() {
                    println!("Catalog is empty; run 'extman catalog import' first");
                    return Ok(());
                }
                for key in &keys {
                    if let Some(entry) = workspace.catalog.current(key) {
                        println!("  {key} {}", entry.version);
                    }
                }
                println!("{} extension(s) known", keys.len());
            }
        }
        Ok(())
    }
}
