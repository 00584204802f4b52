// src/bin/hscms.rs

//! hscms
//!
//! Legacy name of the CLI; same commands as `hs`.

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    hubspot_cli::run().await
}
