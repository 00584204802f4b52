// src/commands/accounts.rs

use anyhow::{Context as _, Result};
use reqwest::StatusCode;
use serde_json::Value;

use super::table;
use crate::cli::AccountsCommand;
use crate::config::{remove_override, write_override, AuthType};
use crate::context::Context;
use crate::error::api_status;
use crate::prompts;

pub async fn handle(ctx: &mut Context, command: AccountsCommand) -> Result<()> {
    match command {
        AccountsCommand::List => list(ctx),
        AccountsCommand::Info { target } => info(ctx, target).await,
        AccountsCommand::Remove { target } => {
            let account = target_account(ctx, target)?;
            remove(ctx, &account)
        }
        AccountsCommand::Rename { target, new_name } => rename(ctx, &target, &new_name),
        AccountsCommand::Use { target } => {
            let account = target_account(ctx, target)?;
            use_account(ctx, &account)
        }
        AccountsCommand::Clean { yes } => clean(ctx, yes).await,
        AccountsCommand::CreateOverride { target } => {
            let account = target_account(ctx, target)?;
            create_override(ctx, &account)
        }
        AccountsCommand::RemoveOverride => {
            let cwd = std::env::current_dir()?;
            match remove_override(&cwd)? {
                Some(path) => tracing::info!("Removed {}", path.display()),
                None => tracing::info!("No account override found"),
            }
            Ok(())
        }
    }
}

/// The positional account, else the global `--account`.
fn target_account(ctx: &Context, given: Option<String>) -> Result<String> {
    given
        .or_else(|| ctx.account.clone())
        .context("Name an account, either as an argument or with --account")
}

fn list(ctx: &Context) -> Result<()> {
    let config = &ctx.store.config;
    tracing::info!("Config: {}", ctx.store.path().display());

    if config.accounts.is_empty() {
        tracing::info!("No accounts configured. Run `hs init` or `hs auth`.");
        return Ok(());
    }

    let default = config.default_account.as_deref();
    let rows: Vec<Vec<String>> = config
        .accounts
        .iter()
        .map(|a| {
            let marker = if Some(a.name.as_str()) == default { " (default)" } else { "" };
            vec![
                format!("{}{}", a.name, marker),
                a.account_id.to_string(),
                a.auth_type.to_string(),
            ]
        })
        .collect();

    println!("{}", table(&["Name", "Account ID", "Auth Type"], &rows));
    Ok(())
}

async fn info(ctx: &mut Context, account: Option<String>) -> Result<()> {
    let name = match account {
        Some(a) => ctx
            .store
            .config
            .find_account(&a)
            .map(|a| a.name.clone())
            .with_context(|| format!("No account named {:?} in config", a))?,
        None => ctx.account()?.name.clone(),
    };

    // resolves (and if needed refreshes) the credential before printing
    let client = ctx.client_for(&name).await?;

    let account = ctx
        .store
        .config
        .find_account(&name)
        .with_context(|| format!("No account named {:?} in config", name))?;

    println!("Name: {}", account.name);
    println!("Account ID: {}", client.account_id());
    println!("Auth Type: {}", account.auth_type);
    println!("Environment: {:?}", account.env);

    if let Some(auth) = &account.auth {
        if !auth.scopes.is_empty() {
            println!("Scopes:");
            for scope in &auth.scopes {
                println!("  - {}", scope);
            }
        }
        if account.auth_type == AuthType::PersonalAccessKey {
            if let Some(expires) = &auth.token_info.expires_at {
                println!("Access token valid until: {}", expires);
            }
        }
    }
    Ok(())
}

fn remove(ctx: &mut Context, account: &str) -> Result<()> {
    let removed = ctx.store.config.remove_account(account)?;
    ctx.store.save()?;

    tracing::info!("Removed account {} ({})", removed.name, removed.account_id);
    if ctx.store.config.default_account.is_none() && !ctx.store.config.accounts.is_empty() {
        tracing::warn!("No default account is set; run `hs accounts use <account>`");
    }
    Ok(())
}

fn rename(ctx: &mut Context, account: &str, new_name: &str) -> Result<()> {
    ctx.store.config.rename_account(account, new_name)?;
    ctx.store.save()?;
    tracing::info!("Renamed {} to {}", account, new_name);
    Ok(())
}

fn use_account(ctx: &mut Context, account: &str) -> Result<()> {
    ctx.store.config.set_default(account)?;
    ctx.store.save()?;
    tracing::info!("Default account is now {}", account);
    Ok(())
}

fn create_override(ctx: &Context, account: &str) -> Result<()> {
    let name = ctx
        .store
        .config
        .find_account(account)
        .map(|a| a.name.clone())
        .with_context(|| format!("No account named {:?} in config", account))?;

    let cwd = std::env::current_dir()?;
    let path = write_override(&cwd, &name)?;
    tracing::info!("Commands run below {} now use account {}", cwd.display(), name);
    tracing::debug!(path = %path.display(), "wrote override");
    Ok(())
}

fn is_rejected(status: Option<StatusCode>) -> bool {
    matches!(
        status,
        Some(StatusCode::UNAUTHORIZED) | Some(StatusCode::FORBIDDEN) | Some(StatusCode::NOT_FOUND)
    )
}

/// Check every account's credentials; return the names HubSpot rejects.
async fn find_stale(ctx: &mut Context) -> Result<Vec<String>> {
    let names: Vec<String> = ctx.store.config.accounts.iter().map(|a| a.name.clone()).collect();
    let mut stale = Vec::new();

    for name in names {
        let checked = match ctx.client_for(&name).await {
            Ok(client) => client
                .get::<Value>("/account-info/v3/details", &[])
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        };

        match checked {
            Ok(()) => tracing::debug!(account = %name, "credentials ok"),
            Err(e) if is_rejected(api_status(&e)) => stale.push(name),
            Err(e) => tracing::warn!("Could not check account {}: {:#}", name, e),
        }
    }

    Ok(stale)
}

async fn clean(ctx: &mut Context, yes: bool) -> Result<()> {
    let stale = find_stale(ctx).await?;
    if stale.is_empty() {
        tracing::info!("All accounts are valid");
        return Ok(());
    }

    for name in &stale {
        println!("{}", name);
    }

    let confirmed = yes
        || prompts::confirm(
            ctx.interactive,
            &format!("Remove {} inactive account(s)?", stale.len()),
            "--yes",
        )?;
    if !confirmed {
        tracing::info!("Nothing removed");
        return Ok(());
    }

    for name in &stale {
        ctx.store.config.remove_account(name)?;
    }
    ctx.store.save()?;
    tracing::info!("Removed {} account(s)", stale.len());
    Ok(())
}
