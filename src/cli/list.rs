//! The `list` command: show installed extensions.
//!
//! ```bash
//! extman list
//! extman list --format json
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;

use super::Workspace;

#[derive(Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Arguments for `extman list`.
#[derive(Args)]
pub struct ListCommand {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

impl ListCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let workspace = Workspace::load(config_path).await?;
        let installer = workspace.installer()?;
        let installed = installer.installed()?;

        match self.format {
            OutputFormat::Json => {
                let entries: Vec<serde_json::Value> = installed
                    .iter()
                    .map(|(key, package)| {
                        serde_json::json!({
                            "key": key,
                            "version": package.version.to_string(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            }
            OutputFormat::Table => {
                if installed.is_empty() {
                    println!("No extensions installed");
                    return Ok(());
                }
                println!("{}", "Installed extensions:".bold());
                for (key, package) in installed.iter() {
                    println!("  {key} {}", package.version);
                }
                println!("{} installed", installed.len());
            }
        }
        Ok(())
    }
}
