// src/commands/create.rs

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::api::http_client;
use crate::cli::{CreateArgs, CreateKind};
use crate::config::DEFAULT_HTTP_TIMEOUT_MS;
use crate::prompts;
use crate::templates;

/// GitHub repository (under the HubSpot organisation) behind each boilerplate type.
pub fn boilerplate_repo(kind: CreateKind) -> Option<&'static str> {
    match kind {
        CreateKind::App => Some("crm-card-weather-sample"),
        CreateKind::ReactApp => Some("cms-react-boilerplate"),
        CreateKind::VueApp => Some("cms-vue-boilerplate"),
        CreateKind::WebsiteTheme => Some("cms-theme-boilerplate"),
        CreateKind::WebpackServerless => Some("cms-webpack-serverless-boilerplate"),
        CreateKind::ApiSample => Some("sample-apps-oauth"),
        CreateKind::Module | CreateKind::Template | CreateKind::Function => None,
    }
}

/// `hs create <type> [name] [dest]`. Needs no account.
pub async fn handle(args: CreateArgs, interactive: bool) -> Result<()> {
    let cwd = std::env::current_dir()?;

    let name = match args.name.clone() {
        Some(n) => n,
        None => prompts::text(interactive, "Name", "a NAME argument")?,
    };
    if name.trim().is_empty() {
        bail!("Name cannot be empty");
    }

    let dest = args.dest.clone().map(|d| cwd.join(d)).unwrap_or(cwd);

    match args.kind {
        CreateKind::Module => {
            let path = templates::module(&dest, &name, &["PAGE"])?;
            tracing::info!("Created module {}", path.display());
        }
        CreateKind::Template => {
            let path = templates::template(&dest, &name)?;
            tracing::info!("Created template {}", path.display());
        }
        CreateKind::Function => {
            let endpoint = match args.endpoint {
                Some(e) => e,
                None => prompts::text(interactive, "Endpoint path", "--endpoint")?,
            };
            let endpoint = endpoint.trim_matches('/').to_string();
            let path = templates::function(&dest, &name, &endpoint, &args.method)?;
            tracing::info!(
                "Created function {} {} in {}",
                args.method.to_uppercase(),
                endpoint,
                path.display()
            );
        }
        kind => {
            let Some(repo) = boilerplate_repo(kind) else {
                bail!("No boilerplate for {:?}", kind);
            };
            let target: PathBuf = dest.join(&name);
            if target.exists() && std::fs::read_dir(&target)?.next().is_some() {
                bail!("{} already exists and is not empty", target.display());
            }

            let http = http_client(Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS * 4))?;
            let files = templates::download_boilerplate(&http, repo, &target).await?;
            tracing::info!("Created {} ({} files) from {}", target.display(), files, repo);
        }
    }

    Ok(())
}
