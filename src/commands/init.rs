// src/commands/init.rs

use anyhow::{bail, Result};

use crate::auth::exchange_personal_access_key;
use crate::cli::InitArgs;
use crate::config::{validate_account_name, AccountConfig, AuthType, OAuthConfig};
use crate::context::Context;
use crate::prompts;

/// `hs init`: create a fresh config and connect the first account.
pub async fn handle(ctx: &mut Context, args: InitArgs, use_env: bool) -> Result<()> {
    if ctx.store.exists() {
        bail!(
            "{} already exists; use `hs auth` to add accounts to it",
            ctx.store.path().display()
        );
    }

    let pak = match args.personal_access_key {
        Some(key) => key,
        None if use_env => std::env::var("HUBSPOT_PERSONAL_ACCESS_KEY").map_err(|_| {
            anyhow::anyhow!("HUBSPOT_PERSONAL_ACCESS_KEY must be set when using --use-env")
        })?,
        None => prompts::secret(
            ctx.interactive,
            "Personal access key",
            "--personal-access-key",
        )?,
    };

    let http = ctx.http()?;
    let base_url = ctx
        .api_base_override
        .clone()
        .unwrap_or_else(|| args.env.api_base_url().to_string());

    let exchange = exchange_personal_access_key(&http, &base_url, pak.trim()).await?;

    let name = match ctx.account.clone() {
        Some(name) => name,
        None => {
            let suggested = exchange
                .hub_name
                .clone()
                .map(|n| n.replace(char::is_whitespace, "-"))
                .unwrap_or_else(|| exchange.hub_id.to_string());
            prompts::text_with_default(ctx.interactive, "Account name", &suggested, "--account")?
        }
    };
    validate_account_name(&name)?;

    let account = AccountConfig {
        name: name.clone(),
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
        personal_access_key: Some(pak.trim().to_string()),
    };

    ctx.store.config.upsert_account(account)?;
    ctx.store.config.set_default(&name)?;
    ctx.store.save()?;

    tracing::info!(
        "Connected account {} ({}) and wrote {}",
        name,
        exchange.hub_id,
        ctx.store.path().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::spawn_mock;
    use crate::config::{ConfigStore, LEGACY_CONFIG_NAME};
    use axum::{routing::post, Json, Router};
    use serde_json::json;

    fn pak_exchange_mock() -> Router {
        Router::new().route(
            "/localdevauth/v1/auth/refresh",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["encodedOAuthRefreshToken"], "pak-123");
                Json(json!({
                    "oauthAccessToken": "access-abc",
                    "expiresAtMillis": 4_102_444_800_000i64,
                    "hubId": 987,
                    "scopeGroups": ["content"],
                    "hubName": "Acme Corp"
                }))
            }),
        )
    }

    #[tokio::test]
    async fn init_writes_legacy_config_with_default_portal() {
        let base = spawn_mock(pak_exchange_mock()).await;
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(LEGACY_CONFIG_NAME);

        let mut ctx = Context::new(ConfigStore::empty(&path), Some("acme".into()), Some(base));
        ctx.interactive = false;

        let args = InitArgs {
            personal_access_key: Some("pak-123".into()),
            env: Default::default(),
        };
        handle(&mut ctx, args, false).await.unwrap();

        let written: serde_yaml::Value =
            serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["defaultPortal"], "acme");
        assert_eq!(written["portals"][0]["personalAccessKey"], "pak-123");
        assert_eq!(written["portals"][0]["portalId"], 987);
        assert_eq!(written["portals"][0]["auth"]["tokenInfo"]["accessToken"], "access-abc");
    }

    #[tokio::test]
    async fn init_refuses_existing_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(LEGACY_CONFIG_NAME);
        std::fs::write(&path, "portals: []\n").unwrap();

        let mut ctx = Context::new(ConfigStore::empty(&path), None, None);
        let args = InitArgs {
            personal_access_key: Some("pak-123".into()),
            env: Default::default(),
        };
        let err = handle(&mut ctx, args, false).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
