// src/functions/record.rs

//! Structured execution records and where they go.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Runtime ceiling of deployed HubSpot functions.
pub const MAX_RUNTIME: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Success,
    UnhandledError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub level: String,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: String,
    pub route: String,
    pub method: String,
    pub status: ExecutionStatus,
    /// Start time, epoch milliseconds.
    pub timestamp: i64,
    /// Wall-clock milliseconds.
    pub execution_time: u128,
    pub memory_used_kb: Option<u64>,
    pub logs: Vec<LogLine>,
    /// Response on success, error details otherwise.
    pub payload: Value,
}

impl ExecutionRecord {
    pub fn exceeded_runtime(&self) -> bool {
        self.execution_time > MAX_RUNTIME.as_millis()
    }
}

pub trait RecordSink: Send + Sync {
    fn emit(&self, record: &ExecutionRecord);
}

/// Writes records to the terminal.
pub struct TracingSink {
    /// Also print the full record (including the response) as JSON.
    pub log_output: bool,
}

impl RecordSink for TracingSink {
    fn emit(&self, record: &ExecutionRecord) {
        for line in &record.logs {
            println!("  [{}] {}", line.level, line.message);
        }

        match record.status {
            ExecutionStatus::Success => tracing::info!(
                route = %record.route,
                method = %record.method,
                execution_ms = record.execution_time as u64,
                memory_kb = record.memory_used_kb,
                "SUCCESS"
            ),
            ExecutionStatus::UnhandledError => tracing::error!(
                route = %record.route,
                method = %record.method,
                execution_ms = record.execution_time as u64,
                error = %record.payload,
                "UNHANDLED_ERROR"
            ),
        }

        if record.exceeded_runtime() {
            tracing::warn!(
                route = %record.route,
                "execution took {}ms; deployed functions are stopped after {}ms",
                record.execution_time,
                MAX_RUNTIME.as_millis()
            );
        }

        if self.log_output {
            match serde_json::to_string_pretty(record) {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::warn!("failed to render execution record: {}", e),
            }
        }
    }
}

/// An in-memory sink that keeps every record, for inspection in tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: std::sync::Mutex<Vec<ExecutionRecord>>,
}

#[cfg(test)]
impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl RecordSink for CollectingSink {
    fn emit(&self, record: &ExecutionRecord) {
        if let Ok(mut guard) = self.records.lock() {
            guard.push(record.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_in_platform_casing() {
        assert_eq!(
            serde_json::to_value(ExecutionStatus::UnhandledError).unwrap(),
            "UNHANDLED_ERROR"
        );
        assert_eq!(serde_json::to_value(ExecutionStatus::Success).unwrap(), "SUCCESS");
    }
}
