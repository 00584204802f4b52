// src/api/mod.rs

//! Thin HubSpot HTTP client.
//!
//! Every command talks to HubSpot through `ApiClient`. Authentication is
//! resolved beforehand (see `auth.rs`), so the client only needs a ready
//! credential, the account id and a base URL.
//!
//! Submodules group endpoints by API family. They stay deliberately thin:
//! build a path, send, decode.

pub mod custom_objects;
pub mod file_manager;
pub mod functions;
pub mod hubdb;
pub mod projects;
pub mod secrets;
pub mod source_code;
pub mod test_accounts;

use anyhow::{anyhow, Result};
use reqwest::{multipart::Form, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::error::ApiError;

/// Credential attached to every request.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// OAuth2 or personal-access-key derived access token.
    Bearer(String),
    /// Legacy `hapikey` query parameter.
    ApiKey(String),
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    account_id: u64,
}

/// Build the shared reqwest client with the configured timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("hs-cli/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

impl ApiClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        credentials: Credentials,
        account_id: u64,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            account_id,
        }
    }

    pub fn account_id(&self) -> u64 {
        self.account_id
    }

    /// Raw client for requests outside the API base (e.g. file CDN downloads).
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http.request(method, url);

        match &self.credentials {
            Credentials::Bearer(token) => builder.bearer_auth(token),
            Credentials::ApiKey(key) => builder.query(&[("hapikey", key.as_str())]),
        }
    }

    /// Send a request and turn non-2xx responses into `ApiError::Status`.
    async fn send(&self, method: Method, path: &str, req: RequestBuilder) -> Result<reqwest::Response> {
        tracing::debug!(%method, path, account = self.account_id, "api request");

        let resp = req.send().await.map_err(|source| ApiError::Transport {
            path: path.to_string(),
            source,
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(ApiError::from_response(method.as_str(), path, status, &body).into())
    }

    async fn decode<T: DeserializeOwned>(path: &str, resp: reqwest::Response) -> Result<T> {
        let text = resp.text().await.map_err(|source| ApiError::Transport {
            path: path.to_string(),
            source,
        })?;

        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|source| ApiError::Decode {
                path: path.to_string(),
                source,
            })?
        };

        let decoded = serde_json::from_value(value).map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })?;
        Ok(decoded)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let req = self.request(Method::GET, path).query(query);
        let resp = self.send(Method::GET, path, req).await?;
        Self::decode(path, resp).await
    }

    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let req = self.request(Method::GET, path);
        let resp = self.send(Method::GET, path, req).await?;
        let bytes = resp.bytes().await.map_err(|source| ApiError::Transport {
            path: path.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let req = self.request(Method::POST, path).json(body);
        let resp = self.send(Method::POST, path, req).await?;
        Self::decode(path, resp).await
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let req = self.request(Method::PATCH, path).json(body);
        let resp = self.send(Method::PATCH, path, req).await?;
        Self::decode(path, resp).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let req = self.request(Method::DELETE, path);
        self.send(Method::DELETE, path, req).await?;
        Ok(())
    }

    pub async fn post_multipart<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T> {
        let req = self.request(Method::POST, path).multipart(form);
        let resp = self.send(Method::POST, path, req).await?;
        Self::decode(path, resp).await
    }

    pub async fn put_multipart<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T> {
        let req = self.request(Method::PUT, path).multipart(form);
        let resp = self.send(Method::PUT, path, req).await?;
        Self::decode(path, resp).await
    }
}

/// `prefix` followed by `segments`, each percent-encoded as a single path segment.
pub fn api_path<S: AsRef<str>>(prefix: &str, segments: &[S]) -> Result<String> {
    let mut url = Url::parse("http://localhost/")?.join(prefix)?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("{} cannot take path segments", prefix))?
        .pop_if_empty()
        .extend(segments.iter().map(AsRef::as_ref));
    Ok(url.path().to_string())
}

/// Split a `/`-separated remote path into its non-empty segments.
pub fn remote_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Shared helpers for tests that need a fake HubSpot API.
#[cfg(test)]
pub mod test_support {
    use super::*;
    use axum::Router;
    use tokio::net::TcpListener;

    /// Serve `app` on an ephemeral port and return its base URL.
    pub async fn spawn_mock(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    pub fn client_for(base_url: &str) -> ApiClient {
        ApiClient::new(
            http_client(Duration::from_secs(5)).unwrap(),
            base_url,
            Credentials::Bearer("test-token".into()),
            123,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use axum::{
        http::{HeaderMap, StatusCode},
        routing::get,
        Json, Router,
    };

    #[test]
    fn encodes_paths() {
        assert_eq!(
            api_path("/cms/v3/source-code/draft/content", &remote_segments("/my theme/css/main.css")).unwrap(),
            "/cms/v3/source-code/draft/content/my%20theme/css/main.css"
        );
        assert_eq!(api_path("/cms/v3/functions/secrets/", &["a/b"]).unwrap(), "/cms/v3/functions/secrets/a%2Fb");
    }

    #[tokio::test]
    async fn sends_bearer_and_maps_errors() {
        let app = Router::new()
            .route(
                "/ok",
                get(|headers: HeaderMap| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    Json(serde_json::json!({ "auth": auth }))
                }),
            )
            .route(
                "/missing",
                get(|| async {
                    (
                        StatusCode::NOT_FOUND,
                        Json(serde_json::json!({ "message": "nope", "category": "OBJECT_NOT_FOUND" })),
                    )
                }),
            );

        let base = spawn_mock(app).await;
        let client = client_for(&base);

        let ok: Value = client.get("/ok", &[]).await.unwrap();
        assert_eq!(ok["auth"], "Bearer test-token");

        let err = client.get::<Value>("/missing", &[]).await.unwrap_err();
        assert!(crate::error::is_not_found(&err));
        assert!(err.to_string().contains("nope"));
    }
}
