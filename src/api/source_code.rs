// src/api/source_code.rs

//! Design Manager source-code API (`/cms/v3/source-code`).

use anyhow::Result;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::{api_path, remote_segments, ApiClient};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMetadata {
    pub name: Option<String>,
    #[serde(default)]
    pub folder: bool,
    #[serde(default)]
    pub children: Vec<String>,
}

fn env_path(env: &str, kind: &str, path: &str) -> Result<String> {
    let mut segments = vec![env, kind];
    segments.extend(remote_segments(path));
    api_path("/cms/v3/source-code", &segments)
}

pub async fn metadata(client: &ApiClient, env: &str, path: &str) -> Result<SourceMetadata> {
    let url = env_path(env, "metadata", path)?;
    client.get(&url, &[]).await
}

pub async fn download(client: &ApiClient, env: &str, path: &str) -> Result<Vec<u8>> {
    client.get_bytes(&env_path(env, "content", path)?).await
}

pub async fn upload(client: &ApiClient, env: &str, path: &str, contents: Vec<u8>) -> Result<()> {
    let file_name = path.rsplit('/').next().unwrap_or(path).to_string();
    let form = Form::new().part("file", Part::bytes(contents).file_name(file_name));

    let _: serde_json::Value = client.put_multipart(&env_path(env, "content", path)?, form).await?;
    Ok(())
}

pub async fn delete(client: &ApiClient, env: &str, path: &str) -> Result<()> {
    client.delete(&env_path(env, "content", path)?).await
}
