// src/functions/registry.rs

//! Route registry for the local function server.
//!
//! Built once per (re)load: the manifest is validated, the function folder is
//! staged into a temporary directory and every handler path is resolved
//! against that staged copy. Requests only ever read an immutable registry;
//! `--watch` swaps in a freshly built one.

use anyhow::{bail, Context, Result};
use axum::http::Method;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;

use super::manifest::{normalize_route, FunctionRouteDefinition, Manifest};
use crate::util::copy_dir;

const HANDLER_EXTENSIONS: &[&str] = &["js", "mjs", "cjs"];
pub const DOTENV_NAME: &str = ".env";

/// A validated, staged handler bound to one route.
#[derive(Debug, Clone)]
pub struct HandlerRef {
    pub route: String,
    pub methods: Vec<Method>,
    /// Absolute path inside the staging directory.
    pub file: PathBuf,
    pub environment: BTreeMap<String, String>,
    /// Declared secret names with the values found in `.env`.
    pub secrets: BTreeMap<String, String>,
}

pub enum Lookup<'a> {
    Found(&'a HandlerRef),
    MethodNotAllowed(&'a [Method]),
    NotFound,
}

#[derive(Debug)]
pub struct Registry {
    source: PathBuf,
    routes: BTreeMap<String, HandlerRef>,
    // Dropping the registry removes the staged copy.
    staging: TempDir,
}

/// Validate that `folder` is an existing directory.
pub fn validate_folder(folder: &Path) -> Result<PathBuf> {
    if !folder.exists() {
        bail!("Function folder not found: {:?}", folder);
    }
    if !folder.is_dir() {
        bail!("Function path is not a directory: {:?}", folder);
    }

    let abs = folder
        .canonicalize()
        .with_context(|| format!("Unable to resolve {:?}", folder))?;

    let is_functions_dir = abs
        .extension()
        .map(|e| e == "functions")
        .unwrap_or(false);
    if !is_functions_dir {
        tracing::warn!(
            "{:?} does not end in .functions; HubSpot only deploys folders named <name>.functions",
            abs
        );
    }

    Ok(abs)
}

/// Read `.env` values, keeping only declared secret names.
fn load_secrets(folder: &Path, declared: &[String]) -> Result<BTreeMap<String, String>> {
    let mut all = BTreeMap::new();
    let path = folder.join(DOTENV_NAME);

    if path.is_file() {
        let iter = dotenvy::from_path_iter(&path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        for item in iter {
            let (k, v) = item.with_context(|| format!("Failed to parse {:?}", path))?;
            all.insert(k, v);
        }
    }

    let mut out = BTreeMap::new();
    for name in declared {
        match all.get(name) {
            Some(v) => {
                out.insert(name.clone(), v.clone());
            }
            None => tracing::warn!(
                secret = %name,
                "secret is declared in serverless.json but missing from {}",
                DOTENV_NAME
            ),
        }
    }
    Ok(out)
}

fn check_handler_file(folder: &Path, def: &FunctionRouteDefinition) -> Result<()> {
    // handlers run from the staged copy, so they must live inside the folder
    let inside = def
        .file
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !inside {
        bail!(
            "Handler file for route {:?} must be a relative path inside the function folder: {:?}",
            def.route,
            def.file
        );
    }

    let path = folder.join(&def.file);
    if !path.is_file() {
        bail!(
            "Handler file for route {:?} not found: {:?}",
            def.route,
            path
        );
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if !HANDLER_EXTENSIONS.contains(&ext.as_str()) {
        bail!(
            "Handler file for route {:?} must be JavaScript (.js, .mjs, .cjs): {:?}",
            def.route,
            path
        );
    }
    Ok(())
}

impl Registry {
    /// Validate, stage and index a function folder.
    pub fn build(folder: &Path) -> Result<Self> {
        let source = validate_folder(folder)?;
        let manifest = Manifest::load(&source)?;
        if let Some(runtime) = manifest.runtime.as_deref().filter(|r| !r.starts_with("nodejs")) {
            tracing::warn!(runtime, "Handlers run under the local node binary regardless of runtime");
        }
        let definitions = manifest.routes()?;

        for def in &definitions {
            check_handler_file(&source, def)?;
        }

        let staging = tempfile::Builder::new()
            .prefix("hs-functions-")
            .tempdir()
            .context("Failed to create staging directory")?;
        copy_dir(&source, staging.path())?;

        let mut routes = BTreeMap::new();
        for def in definitions {
            let secrets = load_secrets(&source, &def.secret_names)?;
            let handler = HandlerRef {
                route: def.route.clone(),
                methods: def.methods,
                file: staging.path().join(&def.file),
                environment: def.local_environment,
                secrets,
            };
            routes.insert(def.route, handler);
        }

        tracing::debug!(
            source = %source.display(),
            staging = %staging.path().display(),
            routes = routes.len(),
            "built function registry"
        );

        Ok(Self {
            source,
            routes,
            staging,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn staging_dir(&self) -> &Path {
        self.staging.path()
    }

    pub fn routes(&self) -> impl Iterator<Item = &HandlerRef> {
        self.routes.values()
    }

    pub fn lookup(&self, path: &str, method: &Method) -> Lookup<'_> {
        match self.routes.get(&normalize_route(path)) {
            Some(h) if h.methods.contains(method) => Lookup::Found(h),
            Some(h) => Lookup::MethodNotAllowed(&h.methods),
            None => Lookup::NotFound,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::hello_folder;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn builds_and_stages_registry() {
        let tmp = tempdir().unwrap();
        let folder = hello_folder(tmp.path());

        let registry = Registry::build(&folder).unwrap();
        let handler = match registry.lookup("/hello/", &Method::GET) {
            Lookup::Found(h) => h,
            _ => panic!("hello route should resolve"),
        };

        assert!(handler.file.starts_with(registry.staging_dir()));
        assert!(handler.file.is_file());
        assert_eq!(handler.environment["GREETING"], "hi");
        assert_eq!(handler.secrets.len(), 1);
        assert_eq!(handler.secrets["API_TOKEN"], "s3cret");

        assert!(matches!(
            registry.lookup("hello", &Method::POST),
            Lookup::MethodNotAllowed(_)
        ));
        assert!(matches!(registry.lookup("nope", &Method::GET), Lookup::NotFound));
    }

    #[test]
    fn staging_is_removed_on_drop() {
        let tmp = tempdir().unwrap();
        let folder = hello_folder(tmp.path());

        let registry = Registry::build(&folder).unwrap();
        let staged = registry.staging_dir().to_path_buf();
        assert!(staged.exists());

        drop(registry);
        assert!(!staged.exists());
    }

    #[test]
    fn missing_folder_is_an_error() {
        let tmp = tempdir().unwrap();
        let err = Registry::build(&tmp.path().join("absent.functions")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn missing_handler_file_is_an_error() {
        let tmp = tempdir().unwrap();
        let folder = hello_folder(tmp.path());
        std::fs::remove_file(folder.join("hello.js")).unwrap();

        let err = Registry::build(&folder).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn handler_outside_folder_is_rejected() {
        let tmp = tempdir().unwrap();
        let folder = hello_folder(tmp.path());
        std::fs::write(tmp.path().join("shared.js"), "exports.main = () => {};\n").unwrap();

        for file in ["../shared.js", "/etc/hosts.js"] {
            std::fs::write(
                folder.join("serverless.json"),
                format!(r#"{{ "endpoints": {{ "shared": {{ "method": "GET", "file": "{}" }} }} }}"#, file),
            )
            .unwrap();

            let err = Registry::build(&folder).unwrap_err();
            assert!(err.to_string().contains("inside the function folder"), "{}: {}", file, err);
        }
    }
}
