// src/lib.rs

//! hubspot-cli
//!
//! Shared root of the `hs` and `hscms` binaries.
//!
//! Responsibilities of this file:
//! - Parse CLI arguments
//! - Install logging
//! - Hand off execution to the runner and turn its result into an exit code
//!
//! There is intentionally *no business logic* here.

mod api;
mod auth;
mod cli;
mod commands;
mod config;
mod context;
mod error;
mod functions;
mod logging;
mod prompts;
mod runner;
mod templates;
mod util;

use clap::Parser;
use std::process::ExitCode;

/// Run the CLI against the process arguments.
///
/// Usage lines follow the binary name the user typed.
pub async fn run() -> ExitCode {
    let cli = cli::Cli::parse();
    logging::init(cli.debug);

    match runner::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("{:?}", e);
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
