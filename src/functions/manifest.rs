// src/functions/manifest.rs

//! `serverless.json` parsing.
//!
//! Example:
//!
//! {
//!   "runtime": "nodejs18.x",
//!   "environment": { "GLOBAL_FLAG": "on" },
//!   "secrets": ["API_TOKEN"],
//!   "endpoints": {
//!     "hello": { "method": ["GET", "POST"], "file": "hello.js" }
//!   }
//! }

use anyhow::{bail, Context, Result};
use axum::http::Method;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::util::read_to_string;

pub const MANIFEST_NAME: &str = "serverless.json";

#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub runtime: Option<String>,

    /// Variables visible to every endpoint.
    #[serde(default, deserialize_with = "string_map")]
    pub environment: BTreeMap<String, String>,

    /// Secret names visible to every endpoint.
    #[serde(default)]
    pub secrets: Vec<String>,

    #[serde(default)]
    pub endpoints: BTreeMap<String, EndpointDef>,
}

#[derive(Debug, Deserialize)]
pub struct EndpointDef {
    #[serde(default)]
    pub method: Option<MethodSpec>,

    pub file: String,

    #[serde(default, deserialize_with = "string_map")]
    pub environment: BTreeMap<String, String>,

    #[serde(default)]
    pub secrets: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MethodSpec {
    One(String),
    Many(Vec<String>),
}

/// One route as the harness serves it.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionRouteDefinition {
    pub route: String,
    pub methods: Vec<Method>,
    /// Handler file, relative to the function folder.
    pub file: PathBuf,
    pub secret_names: Vec<String>,
    /// Global environment merged with the endpoint's own (endpoint wins).
    pub local_environment: BTreeMap<String, String>,
}

/// Environment values may be written as numbers or booleans; keep them as text.
fn string_map<'de, D>(de: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, Value> = BTreeMap::deserialize(de)?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| {
            let s = match v {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (k, s)
        })
        .collect())
}

/// Normalise a route key: no leading/trailing slashes.
pub fn normalize_route(route: &str) -> String {
    route.trim().trim_matches('/').to_string()
}

impl Manifest {
    pub fn load(folder: &Path) -> Result<Self> {
        let path = folder.join(MANIFEST_NAME);
        if !path.is_file() {
            bail!("No {} found in {:?}", MANIFEST_NAME, folder);
        }

        let raw = read_to_string(&path)?;
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {:?}", path))
    }

    /// Expand the manifest into route definitions.
    pub fn routes(&self) -> Result<Vec<FunctionRouteDefinition>> {
        if self.endpoints.is_empty() {
            bail!("{} does not declare any endpoints", MANIFEST_NAME);
        }

        let mut out = Vec::with_capacity(self.endpoints.len());

        for (route, def) in &self.endpoints {
            let route = normalize_route(route);
            if route.is_empty() {
                bail!("Endpoint routes cannot be empty");
            }

            let names = match &def.method {
                None => vec!["GET".to_string()],
                Some(MethodSpec::One(m)) => vec![m.clone()],
                Some(MethodSpec::Many(ms)) => ms.clone(),
            };
            if names.is_empty() {
                bail!("Endpoint {:?} declares an empty method list", route);
            }

            let mut methods = Vec::with_capacity(names.len());
            for name in names {
                let method = Method::from_bytes(name.trim().to_uppercase().as_bytes())
                    .with_context(|| format!("Endpoint {:?} has invalid method {:?}", route, name))?;
                if !methods.contains(&method) {
                    methods.push(method);
                }
            }

            let mut secret_names = self.secrets.clone();
            for s in &def.secrets {
                if !secret_names.contains(s) {
                    secret_names.push(s.clone());
                }
            }

            let mut local_environment = self.environment.clone();
            local_environment.extend(def.environment.clone());

            out.push(FunctionRouteDefinition {
                route,
                methods,
                file: PathBuf::from(&def.file),
                secret_names,
                local_environment,
            });
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Manifest {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn expands_methods_secrets_and_environment() {
        let manifest = parse(
            r#"{
              "environment": { "MODE": "global", "RETRIES": 3 },
              "secrets": ["SHARED"],
              "endpoints": {
                "/contacts/": {
                  "method": ["get", "POST", "GET"],
                  "file": "contacts.js",
                  "environment": { "MODE": "local" },
                  "secrets": ["CRM_TOKEN", "SHARED"]
                },
                "ping": { "file": "ping.js" }
              }
            }"#,
        );

        let routes = manifest.routes().unwrap();
        assert_eq!(routes.len(), 2);

        let contacts = routes.iter().find(|r| r.route == "contacts").unwrap();
        assert_eq!(contacts.methods, vec![Method::GET, Method::POST]);
        assert_eq!(contacts.secret_names, vec!["SHARED", "CRM_TOKEN"]);
        assert_eq!(contacts.local_environment["MODE"], "local");
        assert_eq!(contacts.local_environment["RETRIES"], "3");

        let ping = routes.iter().find(|r| r.route == "ping").unwrap();
        assert_eq!(ping.methods, vec![Method::GET]);
        assert_eq!(ping.local_environment["MODE"], "global");
    }

    #[test]
    fn rejects_manifest_without_endpoints() {
        let manifest = parse(r#"{ "runtime": "nodejs18.x" }"#);
        let err = manifest.routes().unwrap_err();
        assert!(err.to_string().contains("does not declare any endpoints"));
    }

    #[test]
    fn rejects_invalid_method() {
        let manifest = parse(r#"{ "endpoints": { "x": { "method": "GE T", "file": "x.js" } } }"#);
        assert!(manifest.routes().is_err());
    }
}
