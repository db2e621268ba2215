//! The `resolve` command: show a resolution plan without executing it.
//!
//! ```bash
//! extman resolve news
//! extman resolve news --version 2.0.0
//! ```
//!
//! Conflicts and unresolvable dependencies are printed as data; the exit
//! code is non-zero for a plan that would not install.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::utils::validate_extension_key;
use crate::version::Version;

use super::Workspace;

/// Arguments for `extman resolve`.
#[derive(Args)]
pub struct ResolveCommand {
    /// Extension key to resolve
    key: String,

    /// Resolve an exact version instead of the catalog's current version
    #[arg(long, value_name = "VERSION")]
    version: Option<String>,
}

impl ResolveCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        validate_extension_key(&self.key)?;
        let version = self.version.as_deref().map(Version::parse).transpose()?;

        let workspace = Workspace::load(config_path).await?;
        let installer = workspace.installer()?;
        let plan = installer.resolve(&self.key, version.as_ref())?;

        if plan.is_clean() && plan.is_empty() {
            println!("'{}' is already installed and up to date", self.key);
            return Ok(());
        }

        if !plan.ordered_install_set.is_empty() {
            println!("{}", "Install order:".bold());
            for entry in &plan.ordered_install_set {
                println!("  {} {}", entry.extension_key, entry.version);
            }
        }

        for edge in &plan.suggested {
            println!(
                "{} also suggests '{}' {}",
                "note:".cyan(),
                edge.target_key,
                edge.range
            );
        }

        for (key, conflicts) in &plan.conflict_set {
            for conflict in conflicts {
                println!("{} '{key}' {conflict}", "conflict:".red().bold());
            }
        }
        for (key, reason) in &plan.unresolvable {
            println!("{} '{key}': {reason}", "unresolvable:".red().bold());
        }

        match plan.first_problem() {
            Some(problem) => Err(problem.into()),
            None => Ok(()),
        }
    }
}
