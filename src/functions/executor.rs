// src/functions/executor.rs

//! Executing a handler for one request.
//!
//! `Executor` is the seam between the HTTP server and the JavaScript runtime.
//! The server only sees `ExecutionOutcome`; `NodeExecutor` is the real
//! implementation, tests plug in their own.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command as TokioCommand;

use super::invocation::Invocation;
use super::metrics::PeakMemory;
use super::record::LogLine;
use super::registry::HandlerRef;
use super::shim::{node_shim, RESULT_MARKER, SHIM_FILE_NAME};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, Deserialize)]
pub struct HandlerError {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub stack: Option<String>,
}

/// Result line reported by the shim.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionOutcome {
    pub ok: bool,
    #[serde(default)]
    pub responded: bool,
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub error: Option<HandlerError>,
    #[serde(default)]
    pub logs: Vec<LogLine>,
    #[serde(skip)]
    pub memory_kb: Option<u64>,
}

impl ExecutionOutcome {
    pub fn succeeded(&self) -> bool {
        self.ok && self.responded && self.error.is_none()
    }
}

pub trait Executor: Send + Sync {
    fn execute<'a>(
        &'a self,
        handler: &'a HandlerRef,
        invocation: &'a Invocation,
    ) -> BoxFuture<'a, Result<ExecutionOutcome>>;
}

/// Runs handlers with a Node.js binary through the bundled shim.
pub struct NodeExecutor {
    node: String,
    shim_path: PathBuf,
    // keeps the shim file alive
    _shim_dir: TempDir,
}

impl NodeExecutor {
    pub fn new(node: impl Into<String>) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("hs-function-shim-")
            .tempdir()
            .context("Failed to create shim directory")?;
        let shim_path = dir.path().join(SHIM_FILE_NAME);
        std::fs::write(&shim_path, node_shim()).context("Failed to write function runner shim")?;

        Ok(Self {
            node: node.into(),
            shim_path,
            _shim_dir: dir,
        })
    }

    async fn run(&self, handler: &HandlerRef, invocation: &Invocation) -> Result<ExecutionOutcome> {
        let tmp = tempfile::tempdir().context("Failed to create temp dir")?;

        let context_path = tmp.path().join("context.json");
        std::fs::write(&context_path, serde_json::to_vec(&invocation.context)?)
            .context("Failed to write invocation context")?;

        let mut cmd = TokioCommand::new(&self.node);
        cmd.arg(&self.shim_path)
            .arg(&handler.file)
            .arg(&context_path)
            .current_dir(handler.file.parent().unwrap_or(tmp.path()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (k, v) in &invocation.environment {
            cmd.env(k, v);
        }

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn {:?}; is Node.js installed?", self.node))?;

        let mem = child.id().map(PeakMemory::sample);

        let output = child
            .wait_with_output()
            .await
            .context("Failed while waiting for the handler process")?;

        let memory_kb = match mem {
            Some(sampler) => sampler.finish().await,
            None => None,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut outcome = parse_shim_output(&stdout, &stderr)?;
        outcome.memory_kb = memory_kb;
        Ok(outcome)
    }
}

impl Executor for NodeExecutor {
    fn execute<'a>(
        &'a self,
        handler: &'a HandlerRef,
        invocation: &'a Invocation,
    ) -> BoxFuture<'a, Result<ExecutionOutcome>> {
        Box::pin(self.run(handler, invocation))
    }
}

/// Find the shim's result line; anything else on stdout/stderr becomes log lines.
pub fn parse_shim_output(stdout: &str, stderr: &str) -> Result<ExecutionOutcome> {
    let mut stray = Vec::new();
    let mut result = None;

    for line in stdout.lines() {
        match line.strip_prefix(RESULT_MARKER) {
            Some(json) => result = Some(json),
            None if !line.trim().is_empty() => stray.push(LogLine {
                level: "stdout".into(),
                message: line.to_string(),
                timestamp: None,
            }),
            None => {}
        }
    }

    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
        stray.push(LogLine {
            level: "stderr".into(),
            message: line.to_string(),
            timestamp: None,
        });
    }

    let Some(json) = result else {
        let detail = stray
            .iter()
            .map(|l| l.message.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Handler process exited without reporting a result:\n{}", detail);
    };

    let mut outcome: ExecutionOutcome =
        serde_json::from_str(json).context("Function runner emitted invalid JSON")?;
    outcome.logs.extend(stray);
    Ok(outcome)
}
