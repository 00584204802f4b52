// src/functions/invocation.rs

//! Invocation context handed to a handler as its first argument.

use axum::http::HeaderMap;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::registry::HandlerRef;

/// Synthetic platform limits; the local server has no real quota.
pub const MOCK_TIME_REMAINING_MS: u64 = 600_000;
pub const MOCK_EXECUTIONS_REMAINING: u64 = 60;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    pub time_remaining: u64,
    pub executions_remaining: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            time_remaining: MOCK_TIME_REMAINING_MS,
            executions_remaining: MOCK_EXECUTIONS_REMAINING,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationContext {
    pub account_id: u64,
    pub method: String,
    pub endpoint: String,
    pub body: Value,
    pub headers: BTreeMap<String, String>,
    /// Query parameters; repeated keys keep every value.
    pub params: BTreeMap<String, Vec<String>>,
    pub contact: Option<Value>,
    pub limits: Limits,
    pub secrets: BTreeMap<String, String>,
}

/// What an executor needs to run one request.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub context: InvocationContext,
    /// Process environment for the handler: route environment plus secrets.
    pub environment: BTreeMap<String, String>,
}

pub fn mock_contact() -> Value {
    json!({
        "vid": 123456,
        "isLoggedIn": true,
        "listMemberships": [],
    })
}

/// Parse a request body the way the platform does: JSON when possible.
pub fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(_) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

pub struct RequestParts<'a> {
    pub method: &'a str,
    pub headers: &'a HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: &'a [u8],
}

pub fn build_invocation(
    handler: &HandlerRef,
    request: RequestParts<'_>,
    account_id: u64,
    with_contact: bool,
) -> Invocation {
    let headers = request
        .headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect();

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (k, v) in request.query {
        params.entry(k).or_default().push(v);
    }

    let mut environment = handler.environment.clone();
    environment.extend(handler.secrets.clone());

    Invocation {
        context: InvocationContext {
            account_id,
            method: request.method.to_string(),
            endpoint: handler.route.clone(),
            body: parse_body(request.body),
            headers,
            params,
            contact: with_contact.then(mock_contact),
            limits: Limits::default(),
            secrets: handler.secrets.clone(),
        },
        environment,
    }
}
