// src/api/custom_objects.rs

//! CRM custom object schemas (`/crm/v3/schemas`).

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

use super::{api_path, ApiClient};

const SCHEMAS_PATH: &str = "/crm/v3/schemas";

#[derive(Debug, Deserialize)]
struct SchemaList {
    #[serde(default)]
    results: Vec<Value>,
}

pub async fn list(client: &ApiClient) -> Result<Vec<Value>> {
    let list: SchemaList = client.get(SCHEMAS_PATH, &[]).await?;
    Ok(list.results)
}

pub async fn fetch(client: &ApiClient, name: &str) -> Result<Value> {
    client
        .get(&api_path(SCHEMAS_PATH, &[name])?, &[])
        .await
}

pub async fn create(client: &ApiClient, definition: &Value) -> Result<Value> {
    client.post(SCHEMAS_PATH, definition).await
}

pub async fn update(client: &ApiClient, name: &str, definition: &Value) -> Result<Value> {
    client
        .patch(&api_path(SCHEMAS_PATH, &[name])?, definition)
        .await
}

pub async fn delete(client: &ApiClient, name: &str) -> Result<()> {
    client
        .delete(&api_path(SCHEMAS_PATH, &[name])?)
        .await
}
