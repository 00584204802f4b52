// src/auth.rs

//! Account authentication.
//!
//! - Personal access keys are exchanged for short-lived access tokens.
//! - OAuth2 accounts refresh with their refresh token.
//! - API keys are passed through untouched.
//!
//! Cached tokens live in `auth.tokenInfo` of the account; callers persist
//! the config when `resolve_credentials` reports a change.

use anyhow::{bail, Context, Result};
use axum::{extract::Query, response::Html, routing::get, Router};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use url::Url;

use crate::api::Credentials;
use crate::config::{AccountConfig, AuthType, OAuthConfig, TokenInfo};
use crate::error::ApiError;

/// Tokens expiring within this window are refreshed ahead of use.
const REFRESH_MARGIN_MINUTES: i64 = 5;

pub const OAUTH_PORT: u16 = 3000;
pub const DEFAULT_OAUTH_SCOPES: &[&str] = &["content"];

/// Result of exchanging a personal access key.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PakExchange {
    pub oauth_access_token: String,
    pub expires_at_millis: i64,
    pub hub_id: u64,
    #[serde(default)]
    pub scope_groups: Vec<String>,
    pub hub_name: Option<String>,
}

impl PakExchange {
    pub fn token_info(&self) -> TokenInfo {
        let expires = DateTime::<Utc>::from_timestamp_millis(self.expires_at_millis)
            .unwrap_or_else(Utc::now);
        TokenInfo {
            access_token: Some(self.oauth_access_token.clone()),
            expires_at: Some(expires.to_rfc3339()),
            refresh_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

impl OAuthTokens {
    pub fn token_info(&self) -> TokenInfo {
        TokenInfo {
            access_token: Some(self.access_token.clone()),
            expires_at: Some((Utc::now() + ChronoDuration::seconds(self.expires_in)).to_rfc3339()),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

/// Metadata HubSpot returns for an OAuth access token.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenInfo {
    pub hub_id: u64,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub hub_domain: Option<String>,
}

async fn read_json<T: serde::de::DeserializeOwned>(
    path: &str,
    resp: reqwest::Response,
) -> Result<T> {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    if !status.is_success() {
        return Err(ApiError::from_response("POST", path, status, &body).into());
    }

    serde_json::from_str(&body)
        .map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
        .map_err(Into::into)
}

/// Exchange a personal access key for an access token.
pub async fn exchange_personal_access_key(
    http: &reqwest::Client,
    base_url: &str,
    personal_access_key: &str,
) -> Result<PakExchange> {
    let path = "/localdevauth/v1/auth/refresh";
    let resp = http
        .post(format!("{}{}", base_url, path))
        .json(&json!({ "encodedOAuthRefreshToken": personal_access_key }))
        .send()
        .await
        .map_err(|source| ApiError::Transport {
            path: path.to_string(),
            source,
        })?;

    read_json(path, resp)
        .await
        .context("Personal access key was rejected by HubSpot")
}

async fn oauth_token_request(
    http: &reqwest::Client,
    base_url: &str,
    form: &[(&str, &str)],
) -> Result<OAuthTokens> {
    let path = "/oauth/v1/token";
    let resp = http
        .post(format!("{}{}", base_url, path))
        .form(form)
        .send()
        .await
        .map_err(|source| ApiError::Transport {
            path: path.to_string(),
            source,
        })?;

    read_json(path, resp).await
}

pub async fn refresh_oauth(
    http: &reqwest::Client,
    base_url: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<OAuthTokens> {
    oauth_token_request(
        http,
        base_url,
        &[
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
        ],
    )
    .await
    .context("Failed to refresh OAuth2 token")
}

pub async fn exchange_oauth_code(
    http: &reqwest::Client,
    base_url: &str,
    client_id: &str,
    client_secret: &str,
    redirect_uri: &str,
    code: &str,
) -> Result<OAuthTokens> {
    oauth_token_request(
        http,
        base_url,
        &[
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", redirect_uri),
            ("code", code),
        ],
    )
    .await
    .context("Failed to exchange OAuth2 authorization code")
}

pub async fn access_token_info(
    http: &reqwest::Client,
    base_url: &str,
    access_token: &str,
) -> Result<AccessTokenInfo> {
    let path = format!("/oauth/v1/access-tokens/{}", access_token);
    let resp = http
        .get(format!("{}{}", base_url, path))
        .send()
        .await
        .map_err(|source| ApiError::Transport {
            path: path.clone(),
            source,
        })?;

    read_json(&path, resp).await
}

fn token_is_fresh(info: &TokenInfo) -> bool {
    let Some(expires_at) = info.expires_at.as_deref() else {
        return false;
    };
    if info.access_token.is_none() {
        return false;
    }

    match DateTime::parse_from_rfc3339(expires_at) {
        Ok(at) => at.with_timezone(&Utc) - ChronoDuration::minutes(REFRESH_MARGIN_MINUTES) > Utc::now(),
        Err(_) => false,
    }
}

/// Produce a usable credential for `account`, refreshing its token if needed.
///
/// Returns `true` as the second element when the account was mutated and the
/// config should be saved.
pub async fn resolve_credentials(
    http: &reqwest::Client,
    base_url: &str,
    account: &mut AccountConfig,
) -> Result<(Credentials, bool)> {
    match account.auth_type {
        AuthType::ApiKey => {
            let key = account
                .api_key
                .clone()
                .with_context(|| format!("Account {:?} has no apiKey", account.name))?;
            Ok((Credentials::ApiKey(key), false))
        }

        AuthType::PersonalAccessKey => {
            let pak = account
                .personal_access_key
                .clone()
                .with_context(|| format!("Account {:?} has no personalAccessKey", account.name))?;

            if let Some(auth) = &account.auth {
                if token_is_fresh(&auth.token_info) {
                    if let Some(token) = &auth.token_info.access_token {
                        return Ok((Credentials::Bearer(token.clone()), false));
                    }
                }
            }

            tracing::debug!(account = %account.name, "refreshing access token from personal access key");
            let exchange = exchange_personal_access_key(http, base_url, &pak).await?;

            let auth = account.auth.get_or_insert_with(OAuthConfig::default);
            auth.token_info = exchange.token_info();
            auth.scopes = exchange.scope_groups.clone();

            Ok((Credentials::Bearer(exchange.oauth_access_token), true))
        }

        AuthType::OAuth2 => {
            let auth = account
                .auth
                .as_mut()
                .with_context(|| format!("Account {:?} has no oauth2 settings", account.name))?;

            if token_is_fresh(&auth.token_info) {
                if let Some(token) = &auth.token_info.access_token {
                    return Ok((Credentials::Bearer(token.clone()), false));
                }
            }

            let (Some(client_id), Some(client_secret), Some(refresh_token)) = (
                auth.client_id.clone(),
                auth.client_secret.clone(),
                auth.token_info.refresh_token.clone(),
            ) else {
                bail!(
                    "Account {:?} is missing OAuth2 client credentials or refresh token; run `hs auth --auth-type oauth2`",
                    account.name
                );
            };

            tracing::debug!(account = %account.name, "refreshing OAuth2 access token");
            let tokens = refresh_oauth(http, base_url, &client_id, &client_secret, &refresh_token).await?;

            let mut info = tokens.token_info();
            if info.refresh_token.is_none() {
                info.refresh_token = Some(refresh_token);
            }
            auth.token_info = info;

            Ok((Credentials::Bearer(tokens.access_token), true))
        }
    }
}

/* ---------------- oauth2 authorization code flow ---------------- */

pub fn redirect_uri() -> String {
    format!("http://localhost:{}/oauth-callback", OAUTH_PORT)
}

pub fn authorize_url(app_base_url: &str, client_id: &str, scopes: &[String]) -> Result<String> {
    let url = Url::parse_with_params(
        &format!("{}/oauth/authorize", app_base_url.trim_end_matches('/')),
        [
            ("client_id", client_id.to_string()),
            ("redirect_uri", redirect_uri()),
            ("scope", scopes.join(" ")),
        ],
    )?;
    Ok(url.into())
}

/// Run a one-shot local server that waits for HubSpot to redirect back with `?code=`.
pub async fn wait_for_authorization_code(port: u16) -> Result<String> {
    let (tx, rx) = oneshot::channel::<Result<String, String>>();
    let tx = Arc::new(Mutex::new(Some(tx)));

    let app = Router::new().route(
        "/oauth-callback",
        get(move |Query(params): Query<HashMap<String, String>>| {
            let tx = Arc::clone(&tx);
            async move {
                let outcome = match (params.get("code"), params.get("error")) {
                    (Some(code), _) => Ok(code.clone()),
                    (None, Some(err)) => Err(err.clone()),
                    (None, None) => Err("missing code parameter".to_string()),
                };
                let ok = outcome.is_ok();

                if let Ok(mut guard) = tx.lock() {
                    if let Some(sender) = guard.take() {
                        let _ = sender.send(outcome);
                    }
                }

                if ok {
                    Html("<h2>Authorization succeeded.</h2><p>You can close this window and return to your terminal.</p>")
                } else {
                    Html("<h2>Authorization failed.</h2><p>Check your terminal for details.</p>")
                }
            }
        }),
    );

    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("Unable to listen on port {} for the OAuth2 callback", port))?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let outcome = rx.await.context("OAuth2 callback server stopped unexpectedly")?;
    let _ = shutdown_tx.send(());
    let _ = server.await;

    outcome.map_err(|e| anyhow::anyhow!("HubSpot returned an OAuth2 error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::spawn_mock;
    use crate::config::HubSpotEnv;
    use axum::{routing::post, Json};

    fn pak_account() -> AccountConfig {
        AccountConfig {
            name: "dev".into(),
            account_id: 42,
            env: HubSpotEnv::Prod,
            auth_type: AuthType::PersonalAccessKey,
            default_mode: None,
            auth: None,
            api_key: None,
            personal_access_key: Some("pak-123".into()),
        }
    }

    fn mock_refresh() -> Router {
        Router::new().route(
            "/localdevauth/v1/auth/refresh",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["encodedOAuthRefreshToken"], "pak-123");
                let expires = Utc::now().timestamp_millis() + 30 * 60 * 1000;
                Json(json!({
                    "oauthAccessToken": "fresh-token",
                    "expiresAtMillis": expires,
                    "hubId": 42,
                    "scopeGroups": ["content"],
                    "hubName": "dev portal"
                }))
            }),
        )
    }

    #[tokio::test]
    async fn pak_without_cached_token_is_exchanged() {
        let base = spawn_mock(mock_refresh()).await;
        let http = reqwest::Client::new();
        let mut account = pak_account();

        let (creds, changed) = resolve_credentials(&http, &base, &mut account).await.unwrap();
        assert!(changed);
        assert!(matches!(creds, Credentials::Bearer(ref t) if t == "fresh-token"));

        let info = &account.auth.as_ref().unwrap().token_info;
        assert_eq!(info.access_token.as_deref(), Some("fresh-token"));
        assert_eq!(account.auth.as_ref().unwrap().scopes, vec!["content"]);
    }

    #[tokio::test]
    async fn fresh_cached_token_is_reused() {
        let mut account = pak_account();
        account.auth = Some(OAuthConfig {
            token_info: TokenInfo {
                access_token: Some("cached".into()),
                expires_at: Some((Utc::now() + ChronoDuration::hours(1)).to_rfc3339()),
                refresh_token: None,
            },
            ..OAuthConfig::default()
        });

        // unreachable base URL: any network call would fail the test
        let http = reqwest::Client::new();
        let (creds, changed) = resolve_credentials(&http, "http://127.0.0.1:9", &mut account)
            .await
            .unwrap();
        assert!(!changed);
        assert!(matches!(creds, Credentials::Bearer(ref t) if t == "cached"));
    }

    #[test]
    fn nearly_expired_token_is_stale() {
        let info = TokenInfo {
            access_token: Some("t".into()),
            expires_at: Some((Utc::now() + ChronoDuration::minutes(2)).to_rfc3339()),
            refresh_token: None,
        };
        assert!(!token_is_fresh(&info));
    }

    #[test]
    fn authorize_url_encodes_scopes() {
        let url = authorize_url("https://app.hubspot.com", "abc", &["content".into(), "hubdb".into()]).unwrap();
        assert!(url.starts_with("https://app.hubspot.com/oauth/authorize?client_id=abc"));
        assert!(url.contains("scope=content+hubdb"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Foauth-callback"));
    }
}
