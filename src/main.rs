//! extman CLI entry point.
//!
//! Parses the command line, executes the selected command and renders any
//! failure as a user-friendly error with suggestions before exiting
//! non-zero.

use anyhow::Result;
use clap::Parser;
use extman::cli::Cli;
use extman::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let context = user_friendly_error(e);
            context.display();
            std::process::exit(1);
        }
    }
}
