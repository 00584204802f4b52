// src/api/secrets.rs

use anyhow::Result;
use serde::Deserialize;
use serde_json::json;

use super::{api_path, ApiClient};

const SECRETS_PATH: &str = "/cms/v3/functions/secrets";

#[derive(Debug, Deserialize)]
struct SecretList {
    #[serde(default)]
    results: Vec<String>,
}

pub async fn list(client: &ApiClient) -> Result<Vec<String>> {
    let list: SecretList = client.get(SECRETS_PATH, &[]).await?;
    Ok(list.results)
}

pub async fn add(client: &ApiClient, key: &str, value: &str) -> Result<()> {
    let _: serde_json::Value = client
        .post(SECRETS_PATH, &json!({ "key": key, "secret": value }))
        .await?;
    Ok(())
}

pub async fn update(client: &ApiClient, key: &str, value: &str) -> Result<()> {
    let _: serde_json::Value = client
        .patch(SECRETS_PATH, &json!({ "key": key, "secret": value }))
        .await?;
    Ok(())
}

pub async fn delete(client: &ApiClient, key: &str) -> Result<()> {
    client
        .delete(&api_path(SECRETS_PATH, &[key])?)
        .await
}
