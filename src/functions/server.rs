// src/functions/server.rs

use anyhow::{Context, Result};
use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use chrono::Utc;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::Span;
use uuid::Uuid;

use super::executor::{ExecutionOutcome, Executor, NodeExecutor};
use super::invocation::{build_invocation, RequestParts};
use super::record::{ExecutionRecord, ExecutionStatus, RecordSink, TracingSink};
use super::registry::{Lookup, Registry};

pub const DEFAULT_PORT: u16 = 5432;

/// Quiet period after a file change before the registry is rebuilt.
const WATCH_DEBOUNCE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub folder: PathBuf,
    pub account_id: u64,
    pub port: u16,
    pub contact: bool,
    pub watch: bool,
    pub log_output: bool,
    pub node: String,
}

/// Current registry; replaced wholesale on reload.
pub type RegistrySlot = Arc<RwLock<Arc<Registry>>>;

#[derive(Clone)]
pub struct AppState {
    pub registry: RegistrySlot,
    pub executor: Arc<dyn Executor>,
    pub sink: Arc<dyn RecordSink>,
    pub account_id: u64,
    pub contact: bool,
}

impl AppState {
    fn current(&self) -> Arc<Registry> {
        match self.registry.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<Body>| {
                    tracing::debug_span!(
                        "function_request",
                        method = %req.method(),
                        path = %req.uri().path(),
                    )
                })
                .on_response(|res: &Response, latency: Duration, _span: &Span| {
                    tracing::debug!(
                        status = res.status().as_u16(),
                        latency_ms = latency.as_millis() as u64,
                        "request completed"
                    );
                }),
        )
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "message": message.into() }))).into_response()
}

async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Response {
    let registry = state.current();

    let handler = match registry.lookup(uri.path(), &method) {
        Lookup::Found(h) => h,
        Lookup::MethodNotAllowed(allowed) => {
            let allowed = allowed
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            return error_response(
                StatusCode::METHOD_NOT_ALLOWED,
                format!("{} is not bound to {}; allowed: {}", uri.path(), method, allowed),
            );
        }
        Lookup::NotFound => {
            return error_response(
                StatusCode::NOT_FOUND,
                format!("No function is bound to {}", uri.path()),
            );
        }
    };

    let invocation = build_invocation(
        handler,
        RequestParts {
            method: method.as_str(),
            headers: &headers,
            query,
            body: &body,
        },
        state.account_id,
        state.contact,
    );

    let timestamp = Utc::now().timestamp_millis();
    let started = Instant::now();
    let result = state.executor.execute(handler, &invocation).await;
    let elapsed = started.elapsed();

    let (status, payload, logs, memory_kb, response) = match result {
        Ok(outcome) if outcome.succeeded() => {
            let payload = outcome.response.clone().unwrap_or(Value::Null);
            let response = function_response(&payload);
            (ExecutionStatus::Success, payload, outcome.logs, outcome.memory_kb, response)
        }
        Ok(outcome) => {
            let (payload, response) = unhandled(&outcome);
            (ExecutionStatus::UnhandledError, payload, outcome.logs, outcome.memory_kb, response)
        }
        Err(e) => {
            let payload = json!({ "type": "runtime", "message": format!("{:#}", e) });
            let response = (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": ExecutionStatus::UnhandledError, "message": "Function runner failed" })),
            )
                .into_response();
            (ExecutionStatus::UnhandledError, payload, Vec::new(), None, response)
        }
    };

    let record = ExecutionRecord {
        id: Uuid::new_v4().to_string(),
        route: handler.route.clone(),
        method: method.to_string(),
        status,
        timestamp,
        execution_time: elapsed.as_millis(),
        memory_used_kb: memory_kb,
        logs,
        payload,
    };
    state.sink.emit(&record);

    response
}

/// Error reported to the local log in full; the HTTP client only sees the message.
fn unhandled(outcome: &ExecutionOutcome) -> (Value, Response) {
    let (payload, message) = match &outcome.error {
        Some(err) => (
            json!({ "type": err.kind, "message": err.message, "stack": err.stack }),
            err.message.clone(),
        ),
        None => (
            json!({ "type": "no_response", "message": "Function did not send a response" }),
            "Function did not send a response".to_string(),
        ),
    };

    let response = (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "status": ExecutionStatus::UnhandledError, "message": message })),
    )
        .into_response();

    (payload, response)
}

/// Turn `{statusCode, headers, body}` into an HTTP response.
pub fn function_response(payload: &Value) -> Response {
    let shaped = payload.get("statusCode").is_some() || payload.get("body").is_some();
    if !shaped {
        return (StatusCode::OK, Json(payload.clone())).into_response();
    }

    let status = payload
        .get("statusCode")
        .and_then(Value::as_u64)
        .and_then(|c| u16::try_from(c).ok())
        .and_then(|c| StatusCode::from_u16(c).ok())
        .unwrap_or(StatusCode::OK);

    let mut response = match payload.get("body") {
        None | Some(Value::Null) => status.into_response(),
        Some(Value::String(s)) => (status, s.clone()).into_response(),
        Some(other) => (status, Json(other.clone())).into_response(),
    };

    if let Some(headers) = payload.get("headers").and_then(Value::as_object) {
        for (name, value) in headers {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&text),
            ) {
                (Ok(n), Ok(v)) => {
                    response.headers_mut().insert(n, v);
                }
                _ => tracing::warn!(header = %name, "ignoring invalid response header"),
            }
        }
    }

    response
}

/* ---------------- watch mode ---------------- */

/// Rebuild the registry whenever the source folder changes.
fn spawn_watcher(slot: RegistrySlot) -> Result<(RecommendedWatcher, tokio::task::JoinHandle<()>)> {
    let source = {
        let current = slot.read().map_err(|_| anyhow::anyhow!("registry lock poisoned"))?;
        current.source().to_path_buf()
    };

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<notify::Result<notify::Event>>();
    let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let _ = tx.send(res);
    })
    .context("Failed to initialise file watcher")?;

    watcher
        .watch(&source, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {:?}", source))?;

    let task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Err(e) = event {
                tracing::warn!("file watcher error: {}", e);
                continue;
            }

            // coalesce bursts of events from editors
            tokio::time::sleep(WATCH_DEBOUNCE).await;
            while rx.try_recv().is_ok() {}

            if let Err(e) = reload(&slot, source.clone()).await {
                tracing::error!("reload failed, keeping previous version: {:#}", e);
            }
        }
    });

    Ok((watcher, task))
}

/// Build a fresh registry from `source` and swap it into `slot`.
///
/// On error the slot is left untouched.
pub async fn reload(slot: &RegistrySlot, source: PathBuf) -> Result<()> {
    let folder = source.clone();
    let registry = tokio::task::spawn_blocking(move || Registry::build(&folder))
        .await
        .context("reload task failed")??;

    let mut guard = slot
        .write()
        .map_err(|_| anyhow::anyhow!("registry lock poisoned"))?;
    *guard = Arc::new(registry);
    tracing::info!("reloaded functions from {}", source.display());
    Ok(())
}

/* ---------------- server ---------------- */

pub async fn serve(opts: ServerOptions) -> Result<()> {
    let registry = Registry::build(&opts.folder)?;
    tracing::debug!(staging = %registry.staging_dir().display(), "staged functions");
    let slot: RegistrySlot = Arc::new(RwLock::new(Arc::new(registry)));

    let executor = NodeExecutor::new(opts.node.clone())?;
    let state = AppState {
        registry: Arc::clone(&slot),
        executor: Arc::new(executor),
        sink: Arc::new(TracingSink {
            log_output: opts.log_output,
        }),
        account_id: opts.account_id,
        contact: opts.contact,
    };

    let watch = if opts.watch {
        Some(spawn_watcher(Arc::clone(&slot))?)
    } else {
        None
    };

    let addr = SocketAddr::from(([127, 0, 0, 1], opts.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Unable to listen on {}", addr))?;

    {
        let current = state.current();
        for route in current.routes() {
            let methods = route
                .methods
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            tracing::info!("{} http://{}/{}", methods, addr, route.route);
        }
    }
    tracing::info!("local function server listening on http://{} (Ctrl-C to stop)", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await
        .context("Function server failed")?;

    if let Some((watcher, task)) = watch {
        drop(watcher);
        task.abort();
        let _ = task.await;
    }

    // last reference: dropping it removes the staging directory
    drop(slot);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::executor::{BoxFuture, HandlerError};
    use crate::functions::invocation::Invocation;
    use crate::functions::record::{CollectingSink, LogLine};
    use crate::functions::registry::{test_support::hello_folder, HandlerRef};
    use std::sync::Mutex;

    /// Executor double: answers from a closure and remembers invocations.
    struct FakeExecutor {
        respond: Box<dyn Fn(&Invocation) -> Result<ExecutionOutcome> + Send + Sync>,
        seen: Mutex<Vec<Invocation>>,
    }

    impl Executor for FakeExecutor {
        fn execute<'a>(
            &'a self,
            _handler: &'a HandlerRef,
            invocation: &'a Invocation,
        ) -> BoxFuture<'a, Result<ExecutionOutcome>> {
            self.seen.lock().unwrap().push(invocation.clone());
            let out = (self.respond)(invocation);
            Box::pin(async move { out })
        }
    }

    fn outcome(response: Option<Value>, error: Option<HandlerError>) -> ExecutionOutcome {
        ExecutionOutcome {
            ok: error.is_none(),
            responded: response.is_some(),
            response,
            error,
            logs: vec![LogLine {
                level: "log".into(),
                message: "inside handler".into(),
                timestamp: Some(1),
            }],
            memory_kb: Some(2048),
        }
    }

    struct Harness {
        base: String,
        sink: Arc<CollectingSink>,
        executor: Arc<FakeExecutor>,
        _tmp: tempfile::TempDir,
    }

    async fn start(
        contact: bool,
        respond: impl Fn(&Invocation) -> Result<ExecutionOutcome> + Send + Sync + 'static,
    ) -> Harness {
        let tmp = tempfile::tempdir().unwrap();
        let folder = hello_folder(tmp.path());
        let registry = Registry::build(&folder).unwrap();

        let sink = Arc::new(CollectingSink::new());
        let executor = Arc::new(FakeExecutor {
            respond: Box::new(respond),
            seen: Mutex::new(Vec::new()),
        });

        let state = AppState {
            registry: Arc::new(RwLock::new(Arc::new(registry))),
            executor: executor.clone(),
            sink: sink.clone(),
            account_id: 99,
            contact,
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });

        Harness {
            base: format!("http://{}", addr),
            sink,
            executor,
            _tmp: tmp,
        }
    }

    #[tokio::test]
    async fn hello_route_returns_handler_body_and_logs_success() {
        let h = start(false, |_| {
            Ok(outcome(Some(json!({ "statusCode": 200, "body": "hi" })), None))
        })
        .await;

        let resp = reqwest::get(format!("{}/hello?tag=a&tag=b", h.base)).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.unwrap(), "hi");

        let records = h.sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ExecutionStatus::Success);
        assert_eq!(records[0].route, "hello");
        assert_eq!(records[0].logs[0].message, "inside handler");
        assert_eq!(records[0].memory_used_kb, Some(2048));

        let seen = h.executor.seen.lock().unwrap();
        let ctx = &seen[0].context;
        assert_eq!(ctx.account_id, 99);
        assert_eq!(ctx.params["tag"], vec!["a", "b"]);
        assert_eq!(ctx.secrets["API_TOKEN"], "s3cret");
        assert!(ctx.contact.is_none());
    }

    #[tokio::test]
    async fn thrown_error_still_responds_with_unhandled_error() {
        let h = start(true, |_| {
            Ok(outcome(
                None,
                Some(HandlerError {
                    kind: "unhandled".into(),
                    message: "boom".into(),
                    stack: Some("Error: boom\n    at main (hello.js:2:9)".into()),
                }),
            ))
        })
        .await;

        let resp = reqwest::get(format!("{}/hello", h.base)).await.unwrap();
        assert_eq!(resp.status(), 500);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "UNHANDLED_ERROR");
        assert_eq!(body["message"], "boom");
        assert!(body.get("stack").is_none());

        let records = h.sink.records();
        assert_eq!(records[0].status, ExecutionStatus::UnhandledError);
        assert!(records[0].payload["stack"].as_str().unwrap().contains("hello.js"));

        let seen = h.executor.seen.lock().unwrap();
        assert!(seen[0].context.contact.is_some());
    }

    #[tokio::test]
    async fn runner_failure_is_reported_not_crashed() {
        let h = start(false, |_| Err(anyhow::anyhow!("node exploded"))).await;

        let resp = reqwest::get(format!("{}/hello", h.base)).await.unwrap();
        assert_eq!(resp.status(), 500);
        assert_eq!(h.sink.records()[0].status, ExecutionStatus::UnhandledError);

        // server keeps serving
        let resp = reqwest::get(format!("{}/hello", h.base)).await.unwrap();
        assert_eq!(resp.status(), 500);
        assert_eq!(h.sink.records().len(), 2);
    }

    #[tokio::test]
    async fn unknown_route_and_wrong_method() {
        let h = start(false, |_| Ok(outcome(Some(json!({ "body": "x" })), None))).await;
        let client = reqwest::Client::new();

        let resp = client.get(format!("{}/missing", h.base)).send().await.unwrap();
        assert_eq!(resp.status(), 404);

        let resp = client.post(format!("{}/hello", h.base)).send().await.unwrap();
        assert_eq!(resp.status(), 405);

        assert!(h.sink.records().is_empty());
    }

    #[test]
    fn shapes_function_responses() {
        let resp = function_response(&json!({
            "statusCode": 201,
            "headers": { "x-custom": "1" },
            "body": { "created": true }
        }));
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(resp.headers()["x-custom"], "1");
        assert_eq!(resp.headers()["content-type"], "application/json");

        let resp = function_response(&json!({ "anything": 1 }));
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn reload_swaps_registry_and_survives_broken_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = hello_folder(tmp.path());
        let slot: RegistrySlot = Arc::new(RwLock::new(Arc::new(Registry::build(&folder).unwrap())));
        let current = |slot: &RegistrySlot| Arc::clone(&slot.read().unwrap());

        std::fs::write(folder.join("bye.js"), "exports.main = (c, send) => send({ body: \"bye\" });\n").unwrap();
        std::fs::write(
            folder.join("serverless.json"),
            r#"{ "endpoints": { "hello": { "file": "hello.js" }, "bye": { "method": "POST", "file": "bye.js" } } }"#,
        )
        .unwrap();

        let before = current(&slot);
        reload(&slot, folder.clone()).await.unwrap();
        let after = current(&slot);
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(matches!(after.lookup("bye", &Method::POST), Lookup::Found(_)));

        std::fs::write(folder.join("serverless.json"), "{ not json").unwrap();
        assert!(reload(&slot, folder.clone()).await.is_err());

        let kept = current(&slot);
        assert!(Arc::ptr_eq(&after, &kept));
        assert!(matches!(kept.lookup("hello", &Method::GET), Lookup::Found(_)));
    }
}
