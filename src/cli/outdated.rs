//! The `outdated` command: show updates that would resolve cleanly.
//!
//! ```bash
//! extman outdated
//! extman outdated news
//! ```
//!
//! A newer catalog version only counts as an update candidate when its own
//! dependency resolution has no conflicts and nothing unresolvable.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::utils::validate_extension_key;

use super::Workspace;

/// Arguments for `extman outdated`.
#[derive(Args)]
pub struct OutdatedCommand {
    /// Check one extension instead of the whole installed set
    key: Option<String>,
}

impl OutdatedCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let workspace = Workspace::load(config_path).await?;
        let installer = workspace.installer()?;
        let installed = installer.installed()?;

        let keys: Vec<String> = match self.key {
            Some(key) => {
                validate_extension_key(&key)?;
                vec![key]
            }
            None => installed.keys(),
        };

        let mut outdated = 0usize;
        for key in &keys {
            let Some(package) = installed.get(key) else {
                println!("'{key}' is not installed");
                continue;
            };
            if let Some(candidate) = installer.get_update_candidate(key)? {
                outdated += 1;
                println!(
                    "  {key} {} {} {}",
                    package.version,
                    "->".bold(),
                    candidate.version.to_string().green()
                );
            }
        }

        if outdated == 0 {
            println!("Everything is up to date");
        } else {
            println!("{outdated} update(s) available");
        }
        Ok(())
    }
}
