//! `yangval` command-line interface
//!
//! Validates YANG datastores and edit-config requests from JSON files.

use clap::Parser;
use std::process::ExitCode;
use yang_service::cli::Cli;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    Ok(if cli.run()? { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
