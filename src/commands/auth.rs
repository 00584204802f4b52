// src/commands/auth.rs

use anyhow::{Context as _, Result};

use crate::auth::{
    access_token_info, authorize_url, exchange_oauth_code, exchange_personal_access_key,
    redirect_uri, wait_for_authorization_code, DEFAULT_OAUTH_SCOPES, OAUTH_PORT,
};
use crate::cli::AuthArgs;
use crate::config::{validate_account_name, AccountConfig, AuthType, OAuthConfig};
use crate::context::Context;
use crate::prompts;

/// `hs auth`: add an account to the config, or refresh the credentials of
/// an existing one (matched by account id).
pub async fn handle(ctx: &mut Context, args: AuthArgs) -> Result<()> {
    let http = ctx.http()?;
    let base_url = ctx
        .api_base_override
        .clone()
        .unwrap_or_else(|| args.env.api_base_url().to_string());

    let (account_id, suggested, mut account) = match args.auth_type {
        AuthType::PersonalAccessKey => {
            let pak = match args.personal_access_key {
                Some(key) => key,
                None => prompts::secret(ctx.interactive, "Personal access key", "--personal-access-key")?,
            };
            let pak = pak.trim().to_string();
            let exchange = exchange_personal_access_key(&http, &base_url, &pak).await?;

            let account = AccountConfig {
                name: String::new(),
                account_id: exchange.hub_id,
                env: args.env,
                auth_type: AuthType::PersonalAccessKey,
                default_mode: None,
                auth: Some(OAuthConfig {
                    scopes: exchange.scope_groups.clone(),
                    token_info: exchange.token_info(),
                    ..OAuthConfig::default()
                }),
                api_key: None,
                personal_access_key: Some(pak),
            };
            (exchange.hub_id, exchange.hub_name.clone(), account)
        }

        AuthType::OAuth2 => {
            let client_id = match args.client_id {
                Some(id) => id,
                None => prompts::text(ctx.interactive, "OAuth2 client id", "--client-id")?,
            };
            let client_secret = match args.client_secret {
                Some(secret) => secret,
                None => prompts::secret(ctx.interactive, "OAuth2 client secret", "--client-secret")?,
            };
            let scopes = if args.scopes.is_empty() {
                DEFAULT_OAUTH_SCOPES.iter().map(|s| s.to_string()).collect()
            } else {
                args.scopes
            };

            let url = authorize_url(args.env.app_base_url(), &client_id, &scopes)?;
            tracing::info!("Open this URL to authorize the CLI:");
            println!("{}", url);

            let code = wait_for_authorization_code(OAUTH_PORT).await?;
            let tokens =
                exchange_oauth_code(&http, &base_url, &client_id, &client_secret, &redirect_uri(), &code)
                    .await?;
            let info = access_token_info(&http, &base_url, &tokens.access_token).await?;

            let account = AccountConfig {
                name: String::new(),
                account_id: info.hub_id,
                env: args.env,
                auth_type: AuthType::OAuth2,
                default_mode: None,
                auth: Some(OAuthConfig {
                    client_id: Some(client_id),
                    client_secret: Some(client_secret),
                    scopes,
                    token_info: tokens.token_info(),
                }),
                api_key: None,
                personal_access_key: None,
            };
            (info.hub_id, info.hub_domain.clone(), account)
        }

        AuthType::ApiKey => {
            anyhow::bail!("API keys are deprecated; use --auth-type personalaccesskey")
        }
    };

    let existing = ctx
        .store
        .config
        .accounts
        .iter()
        .find(|a| a.account_id == account_id)
        .map(|a| a.name.clone());

    account.name = match (ctx.account.clone(), existing) {
        (Some(name), _) => name,
        (None, Some(name)) => name,
        (None, None) => {
            let suggested = suggested
                .map(|n| n.replace(char::is_whitespace, "-"))
                .unwrap_or_else(|| account_id.to_string());
            prompts::text_with_default(ctx.interactive, "Account name", &suggested, "--account")?
        }
    };
    validate_account_name(&account.name)?;

    let name = account.name.clone();
    ctx.store.config.upsert_account(account)?;
    if ctx.store.config.default_account().is_none() {
        ctx.store.config.set_default(&name)?;
    }
    ctx.store
        .save()
        .with_context(|| format!("Failed to save account {}", name))?;

    tracing::info!("Account {} ({}) is connected", name, account_id);
    Ok(())
}
