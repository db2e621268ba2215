//! The `uninstall` command: deactivate and remove an installed extension.
//!
//! ```bash
//! extman uninstall news
//! ```
//!
//! Fails with a list of blockers while other installed extensions still
//! declare a dependency on the target.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::utils::validate_extension_key;

use super::Workspace;

/// Arguments for `extman uninstall`.
#[derive(Args)]
pub struct UninstallCommand {
    /// Extension key to uninstall
    key: String,
}

impl UninstallCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        validate_extension_key(&self.key)?;

        let workspace = Workspace::load(config_path).await?;
        let mut installer = workspace.installer()?;
        installer.uninstall(&self.key).await?;

        println!("{} '{}'", "Uninstalled".green().bold(), self.key);
        Ok(())
    }
}
