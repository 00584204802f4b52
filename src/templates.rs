// src/templates.rs

//! Scaffolds for `hs create` and `hs project create|init`.
//!
//! Small assets (modules, templates, functions, projects) are generated from
//! embedded text. Larger boilerplates are GitHub repositories downloaded as
//! tarballs and unpacked without their top-level directory.

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};

use crate::functions::manifest::MANIFEST_NAME;
use crate::util::{ensure_dir, read_json, write_json};

pub const PROJECT_CONFIG_NAME: &str = "hsproject.json";
pub const PLATFORM_VERSION: &str = "2023.2";

fn write_new(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    std::fs::write(path, contents).with_context(|| format!("Failed to write {:?}", path))
}

/* ---------------- module ---------------- */

const MODULE_HTML: &str = "<!-- module html  -->\n<div class=\"{{ module.css_class }}\">\n  {{ module.text }}\n</div>\n";
const MODULE_CSS: &str = "/* module css */\n";
const MODULE_JS: &str = "// module js\n";

/// Create `<dest>/<name>.module` with meta, fields and the three asset files.
pub fn module(dest: &Path, name: &str, content_types: &[&str]) -> Result<PathBuf> {
    let folder = dest.join(format!("{}.module", name));
    if folder.exists() {
        bail!("{} already exists", folder.display());
    }

    let meta = json!({
        "label": name,
        "css_assets": [],
        "external_js": [],
        "global": false,
        "help_text": "",
        "host_template_types": content_types,
        "js_assets": [],
        "other_assets": [],
        "smart_type": "NOT_SMART",
        "tags": [],
        "is_available_for_new_content": true
    });
    let fields = json!([
        {
            "name": "text",
            "label": "Text",
            "type": "text",
            "required": false,
            "locked": false,
            "default": "Hello from the module"
        }
    ]);

    ensure_dir(&folder)?;
    write_json(&folder.join("meta.json"), &meta)?;
    write_json(&folder.join("fields.json"), &fields)?;
    write_new(&folder.join("module.html"), MODULE_HTML)?;
    write_new(&folder.join("module.css"), MODULE_CSS)?;
    write_new(&folder.join("module.js"), MODULE_JS)?;

    Ok(folder)
}

/* ---------------- template ---------------- */

/// Create `<dest>/<name>.html` with a page template annotation.
pub fn template(dest: &Path, name: &str) -> Result<PathBuf> {
    let path = dest.join(format!("{}.html", name));
    let body = format!(
        "<!--\n  templateType: page\n  isAvailableForNewContent: true\n  label: {name}\n-->\n\
         <!doctype html>\n<html>\n  <head>\n    <meta charset=\"utf-8\">\n    \
         <title>{{{{ content.html_title }}}}</title>\n    {{{{ standard_header_includes }}}}\n  </head>\n  \
         <body>\n    {{% dnd_area \"main\" %}}\n    {{% end_dnd_area %}}\n    {{{{ standard_footer_includes }}}}\n  \
         </body>\n</html>\n",
        name = name
    );
    write_new(&path, &body)?;
    Ok(path)
}

/* ---------------- function ---------------- */

fn function_handler(endpoint: &str) -> String {
    format!(
        "// Handler for /_hcms/api/{endpoint}\n\
         exports.main = async (context, sendResponse) => {{\n  \
         const {{ params, body }} = context;\n  \
         console.log('params', params);\n  \
         sendResponse({{ statusCode: 200, body: {{ message: 'Hello from {endpoint}', params, body }} }});\n\
         }};\n",
        endpoint = endpoint
    )
}

/// Create (or extend) `<dest>/<folder>.functions` with one endpoint.
///
/// An existing `serverless.json` gains the new endpoint; a route that is
/// already declared is an error.
pub fn function(dest: &Path, folder: &str, endpoint: &str, method: &str) -> Result<PathBuf> {
    let folder_name = if folder.ends_with(".functions") {
        folder.to_string()
    } else {
        format!("{}.functions", folder)
    };
    let root = dest.join(folder_name);
    let manifest_path = root.join(MANIFEST_NAME);
    let file_name = format!("{}.js", endpoint.replace('/', "-"));
    let method = method.to_uppercase();

    let mut manifest = if manifest_path.exists() {
        read_json(&manifest_path)?
    } else {
        json!({ "runtime": "nodejs18.x", "version": "1.0", "environment": {}, "secrets": [], "endpoints": {} })
    };

    let endpoints = manifest
        .get_mut("endpoints")
        .and_then(Value::as_object_mut)
        .with_context(|| format!("{} has no endpoints object", manifest_path.display()))?;
    if endpoints.contains_key(endpoint) {
        bail!("Endpoint {} is already declared in {}", endpoint, manifest_path.display());
    }
    endpoints.insert(
        endpoint.to_string(),
        json!({ "method": method, "file": file_name }),
    );

    ensure_dir(&root)?;
    write_new(&root.join(&file_name), &function_handler(endpoint))?;
    write_json(&manifest_path, &manifest)?;

    Ok(root)
}

/* ---------------- project ---------------- */

/// Create `<dest>/<name>` with `hsproject.json` and an empty app under `src/`.
pub fn project(dest: &Path, name: &str) -> Result<PathBuf> {
    let root = dest.join(name);
    let config_path = root.join(PROJECT_CONFIG_NAME);
    if config_path.exists() {
        bail!("{} already exists", config_path.display());
    }

    ensure_dir(&root.join("src"))?;
    write_json(
        &config_path,
        &json!({ "name": name, "srcDir": "src", "platformVersion": PLATFORM_VERSION }),
    )?;
    write_json(
        &root.join("src").join("app").join("app.json"),
        &json!({
            "name": name,
            "description": "",
            "scopes": ["crm.objects.contacts.read"],
            "uid": name.to_lowercase().replace(char::is_whitespace, "_"),
            "public": false,
            "extensions": {}
        }),
    )?;

    Ok(root)
}

/* ---------------- github boilerplates ---------------- */

const GITHUB_OWNER: &str = "HubSpot";

pub fn tarball_url(repo: &str, git_ref: &str) -> String {
    format!(
        "https://github.com/{}/{}/archive/refs/heads/{}.tar.gz",
        GITHUB_OWNER, repo, git_ref
    )
}

/// Download a boilerplate repository and unpack it into `dest`.
pub async fn download_boilerplate(http: &reqwest::Client, repo: &str, dest: &Path) -> Result<usize> {
    let url = tarball_url(repo, "main");
    tracing::debug!(url = %url, "downloading boilerplate");

    let resp = http
        .get(&url)
        .send()
        .await
        .with_context(|| format!("Failed to download {}", url))?
        .error_for_status()
        .with_context(|| format!("Failed to download {}", url))?;
    let bytes = resp.bytes().await?;

    extract_tarball(&bytes, dest)
}

/// Unpack a GitHub `.tar.gz`, dropping the `<repo>-<ref>/` prefix.
///
/// Returns the number of files written.
pub fn extract_tarball(bytes: &[u8], dest: &Path) -> Result<usize> {
    ensure_dir(dest)?;
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut written = 0;

    for entry in archive.entries().context("Invalid tarball")? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();

        let relative: PathBuf = path.components().skip(1).collect();
        if relative.as_os_str().is_empty() {
            continue;
        }
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            tracing::warn!("skipping suspicious archive entry {}", path.display());
            continue;
        }

        let target = dest.join(&relative);
        if entry.header().entry_type().is_dir() {
            ensure_dir(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            ensure_dir(parent)?;
        }
        entry
            .unpack(&target)
            .with_context(|| format!("Failed to extract {}", relative.display()))?;
        written += 1;
    }

    Ok(written)
}
