// src/error.rs

use reqwest::StatusCode;
use serde::Deserialize;

/// Failure returned by the HubSpot HTTP API.
///
/// Commands that need to branch on a status (missing secret, revoked account)
/// downcast the `anyhow::Error` to this type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{method} {path} failed with {status}: {message}{}", correlation_suffix(.correlation_id))]
    Status {
        method: String,
        path: String,
        status: StatusCode,
        category: Option<String>,
        message: String,
        correlation_id: Option<String>,
    },

    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("response from {path} was not valid JSON: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

fn correlation_suffix(id: &Option<String>) -> String {
    match id {
        Some(id) => format!(" (correlation id {})", id),
        None => String::new(),
    }
}

/// Error body shape HubSpot returns for most APIs.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct HubSpotErrorBody {
    message: Option<String>,
    category: Option<String>,
    correlation_id: Option<String>,
}

impl ApiError {
    pub fn from_response(method: &str, path: &str, status: StatusCode, body: &str) -> Self {
        let parsed: HubSpotErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed.message.unwrap_or_else(|| {
            if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            } else {
                body.trim().to_string()
            }
        });

        ApiError::Status {
            method: method.to_string(),
            path: path.to_string(),
            status,
            category: parsed.category,
            message,
            correlation_id: parsed.correlation_id,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Extract the HTTP status from an `anyhow::Error` produced by the API client.
pub fn api_status(err: &anyhow::Error) -> Option<StatusCode> {
    err.chain()
        .find_map(|e| e.downcast_ref::<ApiError>())
        .and_then(ApiError::status)
}

/// True when the error is an API 404.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    api_status(err) == Some(StatusCode::NOT_FOUND)
}
