// src/runner.rs

//! Command dispatch.
//!
//! Resolves the config store once from the global flags, builds the
//! [`Context`] and hands off to the command module. Every command returns a
//! `Result`; the exit code is decided by the caller.

use anyhow::Result;
use std::path::PathBuf;

use crate::cli::{Cli, Command};
use crate::commands;
use crate::config::{ConfigStore, LEGACY_CONFIG_NAME};
use crate::context::Context;

/// Entry point from `lib.rs`.
pub async fn run(cli: Cli) -> Result<()> {
    let Cli {
        config,
        account,
        debug: _,
        use_env,
        api_base_url,
        command,
    } = cli;

    let store = open_store(&command, config, use_env)?;
    let mut ctx = Context::new(store, account, api_base_url);

    match command {
        Command::Init(args) => commands::init::handle(&mut ctx, args, use_env).await,
        Command::Auth(args) => commands::auth::handle(&mut ctx, args).await,
        Command::Accounts { command } => commands::accounts::handle(&mut ctx, command).await,
        Command::Config { command } => commands::config::handle(&mut ctx, command).await,
        Command::Cms { command } => commands::cms::handle(&mut ctx, command).await,
        Command::CustomObject { command } => commands::custom_object::handle(&mut ctx, command).await,
        Command::Hubdb { command } => commands::hubdb::handle(&mut ctx, command).await,
        Command::Secret { command } => commands::secrets::handle(&mut ctx, command).await,
        Command::Filemanager { command } => commands::filemanager::handle(&mut ctx, command).await,
        Command::Project { command } => commands::project::handle(&mut ctx, command).await,
        Command::TestAccount { command } => commands::test_account::handle(&mut ctx, command).await,
        Command::Mcp { command } => commands::mcp::handle(&mut ctx, command).await,
        Command::Create(args) => commands::create::handle(args, ctx.interactive).await,
    }
}

/// Pick the config store for this invocation.
///
/// `init` always targets a new file (`--config`, else `./hubspot.config.yml`)
/// and `create` never reads one. `--use-env` builds an in-memory store;
/// everything else loads the located file, or starts empty when none exists.
fn open_store(command: &Command, explicit: Option<PathBuf>, use_env: bool) -> Result<ConfigStore> {
    if matches!(command, Command::Init(_) | Command::Create(_)) {
        let path = match explicit {
            Some(p) => p,
            None => std::env::current_dir()?.join(LEGACY_CONFIG_NAME),
        };
        return Ok(ConfigStore::empty(&path));
    }

    if use_env {
        return ConfigStore::from_env();
    }

    let path = ConfigStore::locate(explicit.as_deref())?;
    ConfigStore::load_or_default(&path)
}
