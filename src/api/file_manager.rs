// src/api/file_manager.rs

//! File Manager API (`/files/v3`).

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;

use super::{api_path, remote_segments, ApiClient};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FmFile {
    pub id: String,
    pub name: Option<String>,
    pub path: Option<String>,
    pub extension: Option<String>,
    pub url: Option<String>,
    pub access: Option<String>,
}

impl FmFile {
    /// File name including extension, as it should be written locally.
    pub fn local_name(&self) -> String {
        let base = self.name.clone().unwrap_or_else(|| self.id.clone());
        match &self.extension {
            Some(ext) if !ext.is_empty() && !base.ends_with(&format!(".{}", ext)) => {
                format!("{}.{}", base, ext)
            }
            _ => base,
        }
    }

    pub fn is_private(&self) -> bool {
        self.access
            .as_deref()
            .map(|a| a.starts_with("PRIVATE"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FmFolder {
    pub id: String,
    pub name: Option<String>,
    pub path: Option<String>,
}

/// `stat` answers with either a file or a folder.
#[derive(Debug, Clone, Deserialize)]
pub struct FmStat {
    pub file: Option<FmFile>,
    pub folder: Option<FmFolder>,
}

#[derive(Debug, Deserialize)]
struct Paged<T> {
    results: Vec<T>,
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

pub async fn stat(client: &ApiClient, path: &str) -> Result<FmStat> {
    let url = api_path("/files/v3/files/stat", &remote_segments(path))?;
    client.get(&url, &[]).await
}

async fn search_all<T: serde::de::DeserializeOwned>(
    client: &ApiClient,
    url: &str,
    folder_id: &str,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    let mut after: Option<String> = None;

    loop {
        let mut query = vec![
            ("parentFolderIds", folder_id.to_string()),
            ("limit", "100".to_string()),
        ];
        if let Some(a) = &after {
            query.push(("after", a.clone()));
        }

        let page: Paged<T> = client.get(url, &query).await?;
        out.extend(page.results);

        match page.paging.and_then(|p| p.next) {
            Some(next) => after = Some(next.after),
            None => break,
        }
    }

    Ok(out)
}

pub async fn files_in_folder(client: &ApiClient, folder_id: &str) -> Result<Vec<FmFile>> {
    search_all(client, "/files/v3/files/search", folder_id).await
}

pub async fn folders_in_folder(client: &ApiClient, folder_id: &str) -> Result<Vec<FmFolder>> {
    search_all(client, "/files/v3/folders/search", folder_id).await
}

/// Download a file's bytes, asking for a signed URL when it is private.
pub async fn download(client: &ApiClient, file: &FmFile) -> Result<Vec<u8>> {
    let url = if file.is_private() {
        #[derive(Deserialize)]
        struct Signed {
            url: String,
        }
        let signed: Signed = client
            .get(&format!("/files/v3/files/{}/signed-url", file.id), &[])
            .await?;
        signed.url
    } else {
        file.url
            .clone()
            .with_context(|| format!("File {} has no download URL", file.id))?
    };

    let resp = client
        .http()
        .get(&url)
        .send()
        .await
        .with_context(|| format!("Failed to download {}", url))?
        .error_for_status()
        .with_context(|| format!("Download of {} failed", url))?;

    Ok(resp.bytes().await?.to_vec())
}

pub async fn upload(
    client: &ApiClient,
    folder_path: &str,
    file_name: &str,
    contents: Vec<u8>,
) -> Result<FmFile> {
    let options = json!({ "access": "PUBLIC_INDEXABLE", "overwrite": true }).to_string();

    let form = Form::new()
        .part("file", Part::bytes(contents).file_name(file_name.to_string()))
        .text("folderPath", format!("/{}", folder_path.trim_matches('/')))
        .text("options", options);

    client.post_multipart("/files/v3/files", form).await
}
