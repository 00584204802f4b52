// src/commands/filemanager.rs

use anyhow::{bail, Context as _, Result};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::api::file_manager::{self, FmFile};
use crate::api::ApiClient;
use crate::cli::FilemanagerCommand;
use crate::context::Context;
use crate::util::{ensure_dir, join_remote, list_files, to_remote_path};

pub async fn handle(ctx: &mut Context, command: FilemanagerCommand) -> Result<()> {
    let client = ctx.client().await?;
    match command {
        FilemanagerCommand::Fetch {
            src,
            dest,
            overwrite,
        } => {
            let dest = dest.unwrap_or_else(|| PathBuf::from("."));
            fetch(&client, &src, &dest, overwrite).await
        }
        FilemanagerCommand::Upload { src, dest } => upload(&client, &src, &dest).await,
    }
}

async fn fetch_one(client: &ApiClient, file: &FmFile, dir: &Path, overwrite: bool) -> Result<bool> {
    let local = dir.join(file.local_name());
    if local.exists() && !overwrite {
        tracing::warn!("{} exists; skipping (use --overwrite)", local.display());
        return Ok(false);
    }
    let bytes = file_manager::download(client, file).await?;
    ensure_dir(dir)?;
    std::fs::write(&local, bytes).with_context(|| format!("Failed to write {:?}", local))?;
    Ok(true)
}

async fn fetch(client: &ApiClient, src: &str, dest: &Path, overwrite: bool) -> Result<()> {
    let stat = file_manager::stat(client, src).await?;

    if let Some(file) = stat.file {
        fetch_one(client, &file, dest, overwrite).await?;
        tracing::info!("Fetched {} to {}", src, dest.display());
        return Ok(());
    }

    let Some(root) = stat.folder else {
        bail!("{} is neither a file nor a folder in the File Manager", src);
    };

    let root_name = root.name.clone().unwrap_or_else(|| root.id.clone());
    // breadth-first over the folder tree
    let mut queue = VecDeque::from([(root.id.clone(), dest.join(root_name))]);
    let mut count = 0;

    while let Some((folder_id, dir)) = queue.pop_front() {
        ensure_dir(&dir)?;
        for file in file_manager::files_in_folder(client, &folder_id).await? {
            if fetch_one(client, &file, &dir, overwrite).await? {
                count += 1;
            }
        }
        for folder in file_manager::folders_in_folder(client, &folder_id).await? {
            let name = folder.name.clone().unwrap_or_else(|| folder.id.clone());
            queue.push_back((folder.id, dir.join(name)));
        }
    }

    tracing::info!("Fetched {} file(s) from {} to {}", count, src, dest.display());
    Ok(())
}

async fn upload(client: &ApiClient, src: &Path, dest: &str) -> Result<()> {
    if !src.exists() {
        bail!("{} does not exist", src.display());
    }

    if src.is_file() {
        let name = src
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .context("Source has no file name")?;
        let bytes = std::fs::read(src).with_context(|| format!("Failed to read {:?}", src))?;
        let uploaded = file_manager::upload(client, dest, &name, bytes).await?;
        tracing::info!(
            "Uploaded {} to {}",
            src.display(),
            uploaded.url.unwrap_or_else(|| join_remote(dest, &name))
        );
        return Ok(());
    }

    let files = list_files(src)?;
    let mut failed = 0;

    for rel in &files {
        let remote = join_remote(dest, &to_remote_path(rel));
        let (folder, name) = match remote.rsplit_once('/') {
            Some((folder, name)) => (folder.to_string(), name.to_string()),
            None => (String::new(), remote.clone()),
        };
        let bytes = std::fs::read(src.join(rel))
            .with_context(|| format!("Failed to read {:?}", src.join(rel)))?;

        let first = file_manager::upload(client, &folder, &name, bytes.clone()).await;
        let outcome = match first {
            Ok(f) => Ok(f),
            Err(e) => {
                tracing::debug!("retrying {}: {:#}", remote, e);
                file_manager::upload(client, &folder, &name, bytes).await
            }
        };
        if let Err(e) = outcome {
            tracing::error!("Failed to upload {}: {:#}", remote, e);
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{} of {} file(s) failed to upload", failed, files.len());
    }
    tracing::info!("Uploaded {} file(s) to {}", files.len(), dest);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::client_for;
    use axum::{
        extract::{Path as AxPath, Query, State},
        routing::get,
        Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;

    #[tokio::test]
    async fn fetches_folder_tree() {
        let app = Router::new()
            .route(
                "/files/v3/files/stat/*path",
                get(|| async { Json(json!({ "folder": { "id": "10", "name": "images" } })) }),
            )
            .route(
                "/files/v3/files/search",
                get(|State(base): State<String>, Query(q): Query<HashMap<String, String>>| async move {
                    let results = match q["parentFolderIds"].as_str() {
                        "10" => json!([{ "id": "1", "name": "logo", "extension": "png", "url": format!("{}/cdn/logo", base) }]),
                        _ => json!([{ "id": "2", "name": "a.svg", "extension": "svg", "url": format!("{}/cdn/a", base) }]),
                    };
                    Json(json!({ "results": results }))
                }),
            )
            .route(
                "/files/v3/folders/search",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    let results = match q["parentFolderIds"].as_str() {
                        "10" => json!([{ "id": "11", "name": "icons" }]),
                        _ => json!([]),
                    };
                    Json(json!({ "results": results }))
                }),
            )
            .route(
                "/cdn/:name",
                get(|AxPath(name): AxPath<String>| async move { format!("bytes-{}", name) }),
            );

        // the mock needs its own address to hand out CDN urls
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let app = app.with_state(base.clone());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let tmp = tempfile::tempdir().unwrap();
        fetch(&client_for(&base), "images", tmp.path(), false).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(tmp.path().join("images/logo.png")).unwrap(),
            "bytes-logo"
        );
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("images/icons/a.svg")).unwrap(),
            "bytes-a"
        );
    }
}
