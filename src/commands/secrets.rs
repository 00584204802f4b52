// src/commands/secrets.rs

use anyhow::{bail, Result};

use crate::api::{secrets, ApiClient};
use crate::cli::SecretCommand;
use crate::context::Context;
use crate::prompts;

pub async fn handle(ctx: &mut Context, command: SecretCommand) -> Result<()> {
    let client = ctx.client().await?;
    let interactive = ctx.interactive;

    let read_value = |value: Option<String>, name: &str| -> Result<String> {
        match value {
            Some(v) => Ok(v),
            None => prompts::secret(interactive, &format!("Value for {}", name), "--value"),
        }
    };

    match command {
        SecretCommand::Add { name, value } => {
            let value = read_value(value, &name)?;
            secrets::add(&client, &name, &value).await?;
            tracing::info!("Added secret {} to account {}", name, client.account_id());
        }
        SecretCommand::Update { name, value } => {
            update(&client, &name, || read_value(value, &name)).await?;
            tracing::info!("Updated secret {}", name);
        }
        SecretCommand::Delete { name, yes } => {
            let confirm = || {
                Ok(yes
                    || prompts::confirm(interactive, &format!("Delete secret {}?", name), "--yes")?)
            };
            if delete(&client, &name, confirm).await? {
                tracing::info!("Deleted secret {}", name);
            }
        }
        SecretCommand::List => {
            let names = secrets::list(&client).await?;
            if names.is_empty() {
                tracing::info!("No secrets in account {}", client.account_id());
            }
            for name in names {
                println!("{}", name);
            }
        }
    }
    Ok(())
}

/// Existence is checked before the value is asked for.
async fn update(
    client: &ApiClient,
    name: &str,
    value: impl FnOnce() -> Result<String>,
) -> Result<()> {
    ensure_exists(client, name).await?;
    let value = value()?;
    secrets::update(client, name, &value).await
}

/// Returns whether the secret was actually deleted.
async fn delete(
    client: &ApiClient,
    name: &str,
    confirm: impl FnOnce() -> Result<bool>,
) -> Result<bool> {
    ensure_exists(client, name).await?;
    if !confirm()? {
        return Ok(false);
    }
    secrets::delete(client, name).await?;
    Ok(true)
}

async fn ensure_exists(client: &ApiClient, name: &str) -> Result<()> {
    let names = secrets::list(client).await?;
    if !names.iter().any(|n| n == name) {
        bail!(
            "Secret {} does not exist in account {}",
            name,
            client.account_id()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{client_for, spawn_mock};
    use axum::{
        extract::State,
        http::StatusCode,
        routing::{delete as delete_route, get},
        Json, Router,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Hits {
        patch: AtomicUsize,
        delete: AtomicUsize,
    }

    async fn secrets_mock() -> (ApiClient, Arc<Hits>) {
        let hits = Arc::new(Hits::default());
        let app = Router::new()
            .route(
                "/cms/v3/functions/secrets",
                get(|| async { Json(json!({ "results": ["API_TOKEN"] })) }).patch(
                    |State(hits): State<Arc<Hits>>| async move {
                        hits.patch.fetch_add(1, Ordering::SeqCst);
                        Json(json!({}))
                    },
                ),
            )
            .route(
                "/cms/v3/functions/secrets/:key",
                delete_route(|State(hits): State<Arc<Hits>>| async move {
                    hits.delete.fetch_add(1, Ordering::SeqCst);
                    StatusCode::NO_CONTENT
                }),
            )
            .with_state(hits.clone());
        (client_for(&spawn_mock(app).await), hits)
    }

    #[tokio::test]
    async fn update_of_missing_secret_never_patches() {
        let (client, hits) = secrets_mock().await;

        let err = update(&client, "OTHER", || panic!("value must not be asked for"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        assert_eq!(hits.patch.load(Ordering::SeqCst), 0);

        update(&client, "API_TOKEN", || Ok("new".to_string()))
            .await
            .unwrap();
        assert_eq!(hits.patch.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delete_of_missing_secret_never_deletes() {
        let (client, hits) = secrets_mock().await;

        assert!(delete(&client, "OTHER", || Ok(true)).await.is_err());
        assert_eq!(hits.delete.load(Ordering::SeqCst), 0);

        assert!(!delete(&client, "API_TOKEN", || Ok(false)).await.unwrap());
        assert_eq!(hits.delete.load(Ordering::SeqCst), 0);

        assert!(delete(&client, "API_TOKEN", || Ok(true)).await.unwrap());
        assert_eq!(hits.delete.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_secret_is_an_error() {
        let app = Router::new().route(
            "/cms/v3/functions/secrets",
            get(|| async { Json(json!({ "results": ["API_TOKEN"] })) }),
        );
        let client = client_for(&spawn_mock(app).await);

        assert!(ensure_exists(&client, "API_TOKEN").await.is_ok());
        let err = ensure_exists(&client, "OTHER").await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
