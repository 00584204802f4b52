// src/main.rs

//! hs
//!
//! Entry point for the HubSpot developer CLI.

use std::process::ExitCode;

/// Uses Tokio because commands talk to the HubSpot API and the function
/// server spawns and waits on Node processes.
#[tokio::main]
async fn main() -> ExitCode {
    hubspot_cli::run().await
}
