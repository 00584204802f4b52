// src/api/functions.rs

//! Serverless functions API (`/cms/v3/functions`).

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ApiClient;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionRoute {
    pub route: String,
    pub method: String,
    #[serde(default)]
    pub secret_names: Vec<String>,
    pub updated: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RoutesPage {
    #[serde(default)]
    objects: Vec<FunctionRoute>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStatus {
    pub status: String,
    pub build_output_url: Option<String>,
    pub error_reason: Option<String>,
}

impl BuildStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "SUCCESS" | "ERROR")
    }
}

pub async fn list_routes(client: &ApiClient) -> Result<Vec<FunctionRoute>> {
    let page: RoutesPage = client.get("/cms/v3/functions/routes", &[]).await?;
    Ok(page.objects)
}

/// Start a remote build of a `.functions` folder already uploaded to Design Manager.
///
/// The endpoint answers with the bare build id.
pub async fn start_build(client: &ApiClient, folder_path: &str) -> Result<String> {
    let id: serde_json::Value = client
        .post(
            "/cms/v3/functions/build/async",
            &json!({ "folderPath": folder_path }),
        )
        .await?;

    Ok(match id {
        serde_json::Value::String(s) => s,
        other => other
            .get("buildId")
            .map(|v| v.to_string().trim_matches('"').to_string())
            .unwrap_or_else(|| other.to_string()),
    })
}

pub async fn build_status(client: &ApiClient, build_id: &str) -> Result<BuildStatus> {
    client
        .get(&format!("/cms/v3/functions/build/{}/poll", build_id), &[])
        .await
}
