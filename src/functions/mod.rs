// src/functions/mod.rs

//! Local serverless function harness.
//!
//! `hs cms function server <folder>` serves every endpoint declared in the
//! folder's `serverless.json` on localhost and runs the matching handler for
//! each request:
//!
//! manifest -> registry (validated, staged) -> server -> executor -> record sink

pub mod executor;
pub mod invocation;
pub mod manifest;
pub mod metrics;
pub mod record;
pub mod registry;
pub mod server;
pub mod shim;

pub use server::{serve, ServerOptions, DEFAULT_PORT};
