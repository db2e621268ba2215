//! The `install` command: resolve an extension and execute the plan.
//!
//! ```bash
//! extman install news
//! extman install news --version 1.2.0
//! extman install news --download-only
//! ```
//!
//! The command prints one line per processed package and fails when any
//! package in the batch failed, so scripts can rely on the exit code.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Args;
use colored::Colorize;

use crate::installer::PackageOutcome;
use crate::utils::validate_extension_key;
use crate::version::Version;

use super::Workspace;

/// Arguments for `extman install`.
#[derive(Args)]
pub struct InstallCommand {
    /// Extension key to install
    key: String,

    /// Exact version to install instead of the catalog's current version
    #[arg(long, value_name = "VERSION")]
    version: Option<String>,

    /// Fetch and unpack only; do not activate or run setup imports
    #[arg(long)]
    download_only: bool,
}

impl InstallCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        validate_extension_key(&self.key)?;
        let version = self.version.as_deref().map(Version::parse).transpose()?;

        let workspace = Workspace::load(config_path).await?;
        let mut installer = workspace.installer()?;

        if self.download_only {
            let dir = installer.download_only(&self.key, version.as_ref()).await?;
            println!(
                "{} '{}' downloaded to {}",
                "Fetched".green().bold(),
                self.key,
                dir.display()
            );
            return Ok(());
        }

        let result = installer.install(&self.key, version.as_ref()).await?;
        if result.outcomes.is_empty() {
            println!("'{}' is already installed and up to date", self.key);
            return Ok(());
        }

        let mut failed = 0usize;
        for (key, outcome) in &result.outcomes {
            match outcome {
                PackageOutcome::Installed => {
                    println!("  {} {key}", "installed".green());
                }
                PackageOutcome::SkippedDependencyFailed { failed_dependency } => {
                    failed += 1;
                    println!(
                        "  {} {key} (dependency '{failed_dependency}' failed)",
                        "skipped".yellow()
                    );
                }
                PackageOutcome::Failed { reason } => {
                    failed += 1;
                    println!("  {} {key}: {reason}", "failed".red());
                }
            }
        }

        if failed > 0 {
            return Err(anyhow!(
                "{failed} of {} package(s) did not install",
                result.outcomes.len()
            ));
        }
        println!(
            "{} {} package(s) installed",
            "Done:".green().bold(),
            result.outcomes.len()
        );
        Ok(())
    }
}
