// src/api/test_accounts.rs

//! Developer test accounts and CRM batch imports.

use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{api_path, ApiClient};

const TEST_PORTALS: &str = "/integrators/test-portals/v2";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTestAccount {
    #[serde(alias = "testPortalId")]
    pub id: u64,
    pub account_name: Option<String>,
    pub personal_access_key: Option<String>,
}

pub async fn create(client: &ApiClient, definition: &Value) -> Result<CreatedTestAccount> {
    client.post(TEST_PORTALS, definition).await
}

pub async fn delete(client: &ApiClient, id: u64) -> Result<()> {
    client.delete(&format!("{}/{}", TEST_PORTALS, id)).await
}

/// Batch-create CRM records; the API accepts 100 inputs per request.
pub async fn batch_create_records(
    client: &ApiClient,
    object_type: &str,
    records: &[Value],
) -> Result<usize> {
    let path = api_path("/crm/v3/objects", &[object_type, "batch", "create"])?;
    let mut created = 0;

    for chunk in records.chunks(100) {
        let inputs: Vec<Value> = chunk
            .iter()
            .map(|r| match r.get("properties") {
                Some(_) => r.clone(),
                None => json!({ "properties": r }),
            })
            .collect();

        let resp: Value = client.post(&path, &json!({ "inputs": inputs })).await?;
        created += resp
            .get("results")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(chunk.len());
    }

    Ok(created)
}
