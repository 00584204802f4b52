// src/commands/cms.rs

//! Design Manager file transfer and remote serverless functions.

use anyhow::{bail, Context as _, Result};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use super::{poll_until, table, theme, POLL_INTERVAL, POLL_LIMIT};
use crate::api::{functions as fn_api, source_code, ApiClient};
use crate::cli::{CmsCommand, FunctionCommand, ThemeCommand};
use crate::config::PublishMode;
use crate::context::Context;
use crate::functions::{self, ServerOptions};
use crate::util::{ensure_dir, join_remote, list_files, to_remote_path};

pub async fn handle(ctx: &mut Context, command: CmsCommand) -> Result<()> {
    match command {
        CmsCommand::Fetch {
            src,
            dest,
            mode,
            overwrite,
        } => {
            let mode = mode.unwrap_or_else(|| ctx.store.config.publish_mode());
            let client = ctx.client().await?;
            let dest = dest.unwrap_or_else(|| PathBuf::from("."));
            fetch(&client, mode, &src, &dest, overwrite).await
        }

        CmsCommand::Upload { src, dest, mode } => {
            let mode = mode.unwrap_or_else(|| ctx.store.config.publish_mode());
            let client = ctx.client().await?;
            upload(&client, mode, &src, &dest).await
        }

        CmsCommand::Delete { path, mode } => {
            let mode = mode.unwrap_or_else(|| ctx.store.config.publish_mode());
            let client = ctx.client().await?;
            source_code::delete(&client, mode.api_env(), &path).await?;
            tracing::info!("Deleted {} from account {}", path, client.account_id());
            Ok(())
        }

        CmsCommand::Function { command } => function(ctx, command).await,

        CmsCommand::Theme {
            command: ThemeCommand::GenerateSelectors { theme_path },
        } => theme::generate_selectors(&theme_path),
    }
}

/* ---------------- fetch ---------------- */

async fn fetch_file(
    client: &ApiClient,
    mode: PublishMode,
    remote: &str,
    local: &Path,
    overwrite: bool,
) -> Result<bool> {
    if local.exists() && !overwrite {
        tracing::warn!("{} exists; skipping (use --overwrite)", local.display());
        return Ok(false);
    }
    let bytes = source_code::download(client, mode.api_env(), remote).await?;
    if let Some(parent) = local.parent() {
        ensure_dir(parent)?;
    }
    std::fs::write(local, bytes).with_context(|| format!("Failed to write {:?}", local))?;
    tracing::debug!(remote, local = %local.display(), "fetched");
    Ok(true)
}

/// Download `src` (file or folder) below `dest`, keeping the remote basename.
pub async fn fetch(
    client: &ApiClient,
    mode: PublishMode,
    src: &str,
    dest: &Path,
    overwrite: bool,
) -> Result<()> {
    let src = src.trim_matches('/');
    let base_name = src.rsplit('/').next().unwrap_or(src);

    let root = source_code::metadata(client, mode.api_env(), src).await?;
    if !root.folder {
        let local = dest.join(base_name);
        fetch_file(client, mode, src, &local, overwrite).await?;
        tracing::info!("Fetched {} to {}", src, local.display());
        return Ok(());
    }

    // breadth-first over the folder tree
    let mut queue = VecDeque::from([(src.to_string(), dest.join(base_name))]);
    let mut count = 0;

    while let Some((remote_dir, local_dir)) = queue.pop_front() {
        ensure_dir(&local_dir)?;
        let meta = source_code::metadata(client, mode.api_env(), &remote_dir).await?;

        for child in meta.children {
            let remote = join_remote(&remote_dir, &child);
            let local = local_dir.join(&child);
            let child_meta = source_code::metadata(client, mode.api_env(), &remote).await?;
            if child_meta.folder {
                queue.push_back((remote, local));
            } else if fetch_file(client, mode, &remote, &local, overwrite).await? {
                count += 1;
            }
        }
    }

    tracing::info!("Fetched {} file(s) from {} to {}", count, src, dest.join(base_name).display());
    Ok(())
}

/* ---------------- upload ---------------- */

/// Upload one file, or every file below a folder. Each failed file is retried once.
pub async fn upload(client: &ApiClient, mode: PublishMode, src: &Path, dest: &str) -> Result<()> {
    if !src.exists() {
        bail!("{} does not exist", src.display());
    }

    if src.is_file() {
        let bytes = std::fs::read(src).with_context(|| format!("Failed to read {:?}", src))?;
        source_code::upload(client, mode.api_env(), dest, bytes).await?;
        tracing::info!("Uploaded {} to {} in account {}", src.display(), dest, client.account_id());
        return Ok(());
    }

    let files = list_files(src)?;
    let mut failed = Vec::new();

    for rel in &files {
        let remote = join_remote(dest, &to_remote_path(rel));
        let bytes = std::fs::read(src.join(rel))
            .with_context(|| format!("Failed to read {:?}", src.join(rel)))?;

        let first = source_code::upload(client, mode.api_env(), &remote, bytes.clone()).await;
        let outcome = match first {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::debug!("retrying {}: {:#}", remote, e);
                source_code::upload(client, mode.api_env(), &remote, bytes).await
            }
        };

        match outcome {
            Ok(()) => tracing::debug!(remote = %remote, "uploaded"),
            Err(e) => {
                tracing::error!("Failed to upload {}: {:#}", remote, e);
                failed.push(remote);
            }
        }
    }

    if !failed.is_empty() {
        bail!("{} of {} file(s) failed to upload", failed.len(), files.len());
    }
    tracing::info!(
        "Uploaded {} file(s) from {} to {} in account {}",
        files.len(),
        src.display(),
        dest,
        client.account_id()
    );
    Ok(())
}

/* ---------------- functions ---------------- */

async fn function(ctx: &mut Context, command: FunctionCommand) -> Result<()> {
    match command {
        FunctionCommand::List { json } => {
            let client = ctx.client().await?;
            let routes = fn_api::list_routes(&client).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&routes)?);
                return Ok(());
            }
            if routes.is_empty() {
                tracing::info!("No functions are deployed to account {}", client.account_id());
                return Ok(());
            }

            let rows: Vec<Vec<String>> = routes
                .iter()
                .map(|r| {
                    vec![
                        r.route.clone(),
                        r.method.clone(),
                        r.secret_names.join(", "),
                        r.updated.map(format_millis).unwrap_or_default(),
                    ]
                })
                .collect();
            println!("{}", table(&["Route", "Method", "Secrets", "Updated"], &rows));
            Ok(())
        }

        FunctionCommand::Deploy { path } => {
            let client = ctx.client().await?;
            deploy(&client, &path).await
        }

        FunctionCommand::Server {
            path,
            port,
            contact,
            watch,
            log_output,
            node,
        } => {
            // the account only feeds `context.accountId`; fall back to 0 without a config
            let account_id = ctx.account().map(|a| a.account_id).unwrap_or(0);
            functions::serve(ServerOptions {
                folder: path,
                account_id,
                port,
                contact,
                watch,
                log_output,
                node,
            })
            .await
        }
    }
}

fn format_millis(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

async fn deploy(client: &ApiClient, path: &str) -> Result<()> {
    let path = path.trim_matches('/');
    if !path.ends_with(".functions") {
        bail!("{} is not a .functions folder", path);
    }

    let build_id = fn_api::start_build(client, path).await?;
    tracing::info!("Building {} (build {})", path, build_id);

    let status = poll_until(
        POLL_INTERVAL,
        POLL_LIMIT,
        || fn_api::build_status(client, &build_id),
        |s| s.is_terminal(),
    )
    .await?;

    if status.status != "SUCCESS" {
        bail!(
            "Build {} failed: {}",
            build_id,
            status.error_reason.unwrap_or_else(|| status.status.clone())
        );
    }

    tracing::info!("Deployed {} to account {}", path, client.account_id());
    if let Some(url) = status.build_output_url {
        tracing::debug!(build_output = %url);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{client_for, spawn_mock};
    use axum::{
        extract::{Path as AxPath, State},
        http::StatusCode,
        routing::{get, put},
        Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Uploads = Arc<Mutex<HashMap<String, u32>>>;

    #[tokio::test]
    async fn folder_upload_retries_each_failure_once() {
        let uploads: Uploads = Arc::default();

        let app = Router::new()
            .route(
                "/cms/v3/source-code/published/content/*path",
                put(
                    |State(seen): State<Uploads>, AxPath(path): AxPath<String>| async move {
                        let mut seen = seen.lock().unwrap();
                        let n = seen.entry(path.clone()).or_insert(0);
                        *n += 1;
                        // first attempt at b.css fails, the retry succeeds
                        if path.ends_with("b.css") && *n == 1 {
                            return StatusCode::BAD_GATEWAY;
                        }
                        StatusCode::OK
                    },
                ),
            )
            .with_state(uploads.clone());
        let base = spawn_mock(app).await;

        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("css")).unwrap();
        std::fs::write(tmp.path().join("a.html"), "<p>").unwrap();
        std::fs::write(tmp.path().join("css/b.css"), "p{}").unwrap();

        upload(&client_for(&base), PublishMode::Publish, tmp.path(), "site")
            .await
            .unwrap();

        let seen = uploads.lock().unwrap();
        assert_eq!(seen["site/a.html"], 1);
        assert_eq!(seen["site/css/b.css"], 2);
    }

    #[tokio::test]
    async fn fetch_walks_remote_folders() {
        let app = Router::new()
            .route(
                "/cms/v3/source-code/draft/metadata/*path",
                get(|AxPath(path): AxPath<String>| async move {
                    match path.as_str() {
                        "theme" => Json(json!({ "name": "theme", "folder": true, "children": ["a.css", "sub"] })),
                        "theme/sub" => Json(json!({ "name": "sub", "folder": true, "children": ["b.html"] })),
                        other => Json(json!({ "name": other, "folder": false })),
                    }
                }),
            )
            .route(
                "/cms/v3/source-code/draft/content/*path",
                get(|AxPath(path): AxPath<String>| async move { format!("body of {}", path) }),
            );
        let base = spawn_mock(app).await;

        let tmp = tempfile::tempdir().unwrap();
        fetch(&client_for(&base), PublishMode::Draft, "theme", tmp.path(), false)
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(tmp.path().join("theme/sub/b.html")).unwrap(),
            "body of theme/sub/b.html"
        );
        assert!(tmp.path().join("theme/a.css").is_file());
    }

    #[tokio::test]
    async fn fetch_finishes_each_level_before_descending() {
        let fetched: Arc<Mutex<Vec<String>>> = Arc::default();
        let app = Router::new()
            .route(
                "/cms/v3/source-code/draft/metadata/*path",
                get(|AxPath(path): AxPath<String>| async move {
                    let children = match path.as_str() {
                        "theme" => json!(["x.css", "one", "two"]),
                        "theme/one" => json!(["deep", "a.html"]),
                        "theme/two" => json!(["b.html"]),
                        "theme/one/deep" => json!(["c.html"]),
                        _ => return Json(json!({ "name": path, "folder": false })),
                    };
                    Json(json!({ "name": path, "folder": true, "children": children }))
                }),
            )
            .route(
                "/cms/v3/source-code/draft/content/*path",
                get(|State(fetched): State<Arc<Mutex<Vec<String>>>>, AxPath(path): AxPath<String>| async move {
                    fetched.lock().unwrap().push(path);
                    "x"
                }),
            )
            .with_state(fetched.clone());
        let base = spawn_mock(app).await;

        let tmp = tempfile::tempdir().unwrap();
        fetch(&client_for(&base), PublishMode::Draft, "theme", tmp.path(), false)
            .await
            .unwrap();

        assert_eq!(
            *fetched.lock().unwrap(),
            vec![
                "theme/x.css",
                "theme/one/a.html",
                "theme/two/b.html",
                "theme/one/deep/c.html",
            ]
        );
    }

    #[tokio::test]
    async fn deploy_rejects_non_function_paths() {
        let client = client_for("http://127.0.0.1:9");
        let err = deploy(&client, "site/css").await.unwrap_err();
        assert!(err.to_string().contains(".functions"));
    }
}
