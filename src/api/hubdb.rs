// src/api/hubdb.rs

//! HubDB v3 tables and rows.

use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};

use super::ApiClient;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: String,
    pub name: String,
    pub label: Option<String>,
    #[serde(default)]
    pub row_count: u64,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    results: Vec<Value>,
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    next: Option<PagingNext>,
}

#[derive(Debug, Deserialize)]
struct PagingNext {
    after: String,
}

fn table_path(id_or_name: &str) -> Result<String> {
    super::api_path("/cms/v3/hubdb/tables", &[id_or_name])
}

async fn collect_pages(client: &ApiClient, path: &str) -> Result<Vec<Value>> {
    let mut out = Vec::new();
    let mut after: Option<String> = None;

    loop {
        let mut query = vec![("limit", "1000".to_string())];
        if let Some(a) = &after {
            query.push(("after", a.clone()));
        }

        let page: Page = client.get(path, &query).await?;
        out.extend(page.results);

        match page.paging.and_then(|p| p.next) {
            Some(next) => after = Some(next.after),
            None => break,
        }
    }

    Ok(out)
}

pub async fn list_tables(client: &ApiClient) -> Result<Vec<Table>> {
    let raw = collect_pages(client, "/cms/v3/hubdb/tables").await?;
    raw.into_iter()
        .map(|v| serde_json::from_value(v).map_err(Into::into))
        .collect()
}

/// Full table definition (columns etc.) as returned by the API.
pub async fn fetch_table(client: &ApiClient, id_or_name: &str) -> Result<Value> {
    client.get(&table_path(id_or_name)?, &[]).await
}

pub async fn create_table(client: &ApiClient, definition: &Value) -> Result<Table> {
    client.post("/cms/v3/hubdb/tables", definition).await
}

pub async fn delete_table(client: &ApiClient, id_or_name: &str) -> Result<()> {
    client.delete(&table_path(id_or_name)?).await
}

pub async fn publish_table(client: &ApiClient, id_or_name: &str) -> Result<Value> {
    client
        .post(&format!("{}/draft/publish", table_path(id_or_name)?), &json!({}))
        .await
}

/// Published rows.
pub async fn fetch_rows(client: &ApiClient, id_or_name: &str) -> Result<Vec<Value>> {
    collect_pages(client, &format!("{}/rows", table_path(id_or_name)?)).await
}

pub async fn fetch_draft_rows(client: &ApiClient, id_or_name: &str) -> Result<Vec<Value>> {
    collect_pages(client, &format!("{}/rows/draft", table_path(id_or_name)?)).await
}

pub async fn create_rows(client: &ApiClient, id_or_name: &str, rows: &[Value]) -> Result<()> {
    // batch endpoint accepts at most 100 inputs per call
    for chunk in rows.chunks(100) {
        let _: Value = client
            .post(
                &format!("{}/rows/draft/batch/create", table_path(id_or_name)?),
                &json!({ "inputs": chunk }),
            )
            .await?;
    }
    Ok(())
}

pub async fn purge_draft_rows(client: &ApiClient, id_or_name: &str, row_ids: &[String]) -> Result<()> {
    for chunk in row_ids.chunks(100) {
        let _: Value = client
            .post(
                &format!("{}/rows/draft/batch/purge", table_path(id_or_name)?),
                &json!({ "inputs": chunk }),
            )
            .await?;
    }
    Ok(())
}
