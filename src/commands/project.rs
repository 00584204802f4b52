// src/commands/project.rs

use anyhow::{bail, Context as _, Result};
use serde::Deserialize;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{poll_until, POLL_INTERVAL, POLL_LIMIT};
use crate::api::{projects, ApiClient};
use crate::cli::{ProjectCommand, ProjectScaffoldArgs};
use crate::context::Context;
use crate::error::is_not_found;
use crate::prompts;
use crate::templates::{self, PROJECT_CONFIG_NAME};
use crate::util::{find_up, list_files, read_to_string, to_remote_path};

/// Contents of `hsproject.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub name: String,
    pub src_dir: String,
    pub platform_version: Option<String>,
}

/// A located project: its root directory plus parsed config.
#[derive(Debug)]
pub struct LocalProject {
    pub root: PathBuf,
    pub config: ProjectConfig,
}

impl LocalProject {
    /// Find `hsproject.json` in `start` or any ancestor.
    pub fn locate(start: &Path) -> Result<Self> {
        let path = find_up(start, PROJECT_CONFIG_NAME).with_context(|| {
            format!("No {} found in {} or its parents", PROJECT_CONFIG_NAME, start.display())
        })?;
        let config: ProjectConfig = serde_json::from_str(&read_to_string(&path)?)
            .with_context(|| format!("Invalid {}", path.display()))?;

        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self { root, config })
    }

    pub fn src_dir(&self) -> PathBuf {
        self.root.join(&self.config.src_dir)
    }
}

pub async fn handle(ctx: &mut Context, command: ProjectCommand) -> Result<()> {
    match command {
        ProjectCommand::Init(args) => {
            let root = scaffold(ctx, args)?;
            tracing::info!("Initialised project in {}", root.display());
            Ok(())
        }
        ProjectCommand::Create(args) => {
            let root = scaffold(ctx, args)?;
            let project = LocalProject::locate(&root)?;
            let client = ctx.client().await?;
            ensure_remote(&client, &project.config.name).await?;
            tracing::info!(
                "Created project {} in {} and account {}",
                project.config.name,
                root.display(),
                client.account_id()
            );
            Ok(())
        }
        ProjectCommand::Upload { path, message } => {
            let project = locate(path)?;
            let client = ctx.client().await?;
            upload(&client, &project, &message).await.map(|_| ())
        }
        ProjectCommand::Deploy { path, build_id } => {
            let project = locate(path)?;
            let client = ctx.client().await?;
            deploy(&client, &project.config.name, build_id).await
        }
    }
}

fn locate(path: Option<PathBuf>) -> Result<LocalProject> {
    let start = match path {
        Some(p) => p,
        None => std::env::current_dir()?,
    };
    LocalProject::locate(&start)
}

fn scaffold(ctx: &Context, args: ProjectScaffoldArgs) -> Result<PathBuf> {
    let name = match args.name {
        Some(n) => n,
        None => prompts::text(ctx.interactive, "Project name", "a NAME argument")?,
    };
    if name.trim().is_empty() || name.contains('/') {
        bail!("Invalid project name {:?}", name);
    }

    let location = match args.location {
        Some(l) => l,
        None => std::env::current_dir()?,
    };
    templates::project(&location, &name)
}

async fn ensure_remote(client: &ApiClient, name: &str) -> Result<()> {
    match projects::fetch(client, name).await {
        Ok(_) => Ok(()),
        Err(e) if is_not_found(&e) => {
            projects::create(client, name).await?;
            tracing::info!("Created project {} in account {}", name, client.account_id());
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Zip every file under `src` (paths relative to it, `/`-separated).
pub fn zip_dir(src: &Path) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for rel in list_files(src)? {
        let bytes = std::fs::read(src.join(&rel))
            .with_context(|| format!("Failed to read {:?}", src.join(&rel)))?;
        writer.start_file(to_remote_path(&rel), options)?;
        writer.write_all(&bytes)?;
    }

    Ok(writer.finish()?.into_inner())
}

async fn upload(client: &ApiClient, project: &LocalProject, message: &str) -> Result<u64> {
    let src = project.src_dir();
    if !src.is_dir() {
        bail!("Project source directory {} does not exist", src.display());
    }
    let name = &project.config.name;

    ensure_remote(client, name).await?;

    let archive = zip_dir(&src)?;
    tracing::debug!(bytes = archive.len(), "zipped project source");

    let uploaded = projects::upload(client, name, archive, message).await?;
    tracing::info!("Uploaded {}; waiting for build #{}", name, uploaded.build_id);

    let status = poll_until(
        POLL_INTERVAL,
        POLL_LIMIT,
        || projects::build_status(client, name, uploaded.build_id),
        |s| s.is_terminal(),
    )
    .await?;

    if status.status != "SUCCESS" {
        for err in &status.errors {
            tracing::error!("{}", err);
        }
        bail!("Build #{} of {} failed", uploaded.build_id, name);
    }

    tracing::info!("Build #{} of {} succeeded", uploaded.build_id, name);
    Ok(uploaded.build_id)
}

async fn deploy(client: &ApiClient, name: &str, build_id: Option<u64>) -> Result<()> {
    let build_id = match build_id {
        Some(id) => id,
        None => projects::fetch(client, name)
            .await?
            .latest_build
            .map(|b| b.build_id)
            .with_context(|| format!("Project {} has no builds; run `hs project upload`", name))?,
    };

    let queued = projects::deploy(client, name, build_id).await?;
    tracing::info!("Deploying build #{} of {}", build_id, name);

    let status = poll_until(
        POLL_INTERVAL,
        POLL_LIMIT,
        || projects::deploy_status(client, name, queued.id),
        |s| s.is_terminal(),
    )
    .await?;

    if status.status != "SUCCESS" {
        for err in &status.errors {
            tracing::error!("{}", err);
        }
        bail!("Deploy of build #{} failed", build_id);
    }

    tracing::info!("Deployed build #{} of {}", build_id, name);
    Ok(())
}
