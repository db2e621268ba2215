//! Command-line interface for the extman extension manager.
//!
//! The CLI is a thin shell over the engine: every command loads the
//! configuration and the catalog, wires up the file-backed collaborator
//! providers and delegates to the resolver or the installer. All state
//! lives under the configured root directory, so pointing
//! `EXTMAN_CONFIG_PATH` (or `--config`) at a different file gives a fully
//! isolated installation.
//!
//! # Commands
//!
//! - `install` — resolve and install an extension with its dependencies
//! - `uninstall` — deactivate and remove an installed extension
//! - `resolve` — show the resolution plan without executing it
//! - `list` — show installed extensions
//! - `outdated` — show available updates that resolve cleanly
//! - `catalog` — import and inspect the local catalog mirror
//!
//! # Global options
//!
//! `--verbose` and `--quiet` adjust the log filter; `--config` selects the
//! configuration file. All three work with every subcommand.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::installer::Installer;
use crate::ledger::ExecutionLedger;
use crate::providers::{
    DirCacheService, FileActivationState, LoggingObserver, RecordingSchemaService,
    RecordingSeedImporter,
};

mod catalog;
mod install;
mod list;
mod outdated;
mod resolve;
mod uninstall;

/// Top-level argument parser.
#[derive(Parser)]
#[command(
    name = "extman",
    about = "Extension manager - resolve, install and maintain CMS extension packages",
    version,
    long_about = "extman resolves extension dependency constraints against a local catalog \
                  mirror, downloads and unpacks package archives, and drives an idempotent \
                  install pipeline with one-time setup imports."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging (equivalent to RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors; for scripts and automation
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Path to the configuration file (default: ~/.extman/config.toml)
    #[arg(short, long, global = true, env = "EXTMAN_CONFIG_PATH")]
    config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Install an extension and everything it depends on.
    ///
    /// Resolves the request against the catalog first; a plan with
    /// conflicts or unresolvable dependencies fails before anything is
    /// touched. See [`install::InstallCommand`].
    Install(install::InstallCommand),

    /// Deactivate and remove an installed extension.
    ///
    /// Refuses while other installed extensions still depend on it.
    /// See [`uninstall::UninstallCommand`].
    Uninstall(uninstall::UninstallCommand),

    /// Show the resolution plan for an extension without installing.
    ///
    /// See [`resolve::ResolveCommand`].
    Resolve(resolve::ResolveCommand),

    /// List installed extensions.
    ///
    /// See [`list::ListCommand`].
    List(list::ListCommand),

    /// Show installed extensions with a newer cleanly-resolving version.
    ///
    /// See [`outdated::OutdatedCommand`].
    Outdated(outdated::OutdatedCommand),

    /// Import and inspect the local catalog.
    ///
    /// See [`catalog::CatalogCommand`].
    Catalog(catalog::CatalogCommand),
}

impl Cli {
    /// Parse-free entry point: initialize logging and dispatch.
    pub async fn execute(self) -> Result<()> {
        init_logging(self.verbose, self.quiet);

        match self.command {
            Commands::Install(cmd) => cmd.execute(self.config).await,
            Commands::Uninstall(cmd) => cmd.execute(self.config).await,
            Commands::Resolve(cmd) => cmd.execute(self.config).await,
            Commands::List(cmd) => cmd.execute(self.config).await,
            Commands::Outdated(cmd) => cmd.execute(self.config).await,
            Commands::Catalog(cmd) => cmd.execute(self.config).await,
        }
    }
}

/// Install the global tracing subscriber.
///
/// `--verbose` forces debug, `--quiet` errors only; otherwise `RUST_LOG`
/// decides, defaulting to warnings. Log lines go to stderr so command
/// output stays pipeable.
fn init_logging(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // try_init: a test harness may have installed a subscriber already.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Loaded configuration plus the persisted catalog, shared by all commands.
pub(crate) struct Workspace {
    pub config: Config,
    pub catalog: Catalog,
}

impl Workspace {
    /// Load the configuration (explicit path, environment, or default) and
    /// the catalog persisted under its state directory.
    pub async fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config = Config::load_with_optional(config_path).await?;
        let catalog_path = config.catalog_path();
        let catalog = if catalog_path.exists() {
            Catalog::load(&catalog_path)?
        } else {
            Catalog::new()
        };
        Ok(Self { config, catalog })
    }

    /// Build an installer wired to the file-backed providers.
    pub fn installer(&self) -> Result<Installer<'_>> {
        let installer = Installer::new(
            &self.catalog,
            &self.config,
            self.config.fetcher()?,
            Box::new(FileActivationState::load(self.config.activation_path())?),
            Box::new(DirCacheService::new(self.config.cache_dir())),
            Box::new(RecordingSchemaService::new(self.config.schema_log_path())),
            Box::new(RecordingSeedImporter::new(self.config.seeds_record_dir())),
            ExecutionLedger::load(self.config.ledger_path())?,
        );
        Ok(installer.with_observer(Box::new(LoggingObserver)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_install() {
        let cli = Cli::parse_from(["extman", "install", "news"]);
        assert!(matches!(cli.command, Commands::Install(_)));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["extman", "list", "--verbose"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::List(_)));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["extman", "-v", "-q", "list"]).is_err());
    }

    #[test]
    fn test_config_path_flag() {
        let cli = Cli::parse_from(["extman", "--config", "/tmp/x.toml", "list"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.toml")));
    }
}
