// src/commands/mod.rs

//! One module per top-level verb. Every handler returns `Result<()>`; the
//! exit code is decided once in `main`.

pub mod accounts;
pub mod auth;
pub mod cms;
pub mod config;
pub mod create;
pub mod custom_object;
pub mod filemanager;
pub mod hubdb;
pub mod init;
pub mod mcp;
pub mod project;
pub mod secrets;
pub mod test_account;
pub mod theme;

use anyhow::{bail, Result};
use std::future::Future;
use std::time::Duration;

/// Interval between build/deploy status checks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Status checks before giving up (about ten minutes at `POLL_INTERVAL`).
pub const POLL_LIMIT: u32 = 300;

/// Call `fetch` every `interval` until `done` accepts the result.
pub async fn poll_until<T, F, Fut>(
    interval: Duration,
    limit: u32,
    mut fetch: F,
    done: impl Fn(&T) -> bool,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for attempt in 1..=limit {
        let value = fetch().await?;
        if done(&value) {
            return Ok(value);
        }
        tracing::debug!(attempt, "not finished yet");
        tokio::time::sleep(interval).await;
    }
    bail!("Gave up after {} status checks", limit)
}

/// Render rows as left-aligned columns.
pub fn table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let render = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![render(header.to_vec())];
    for row in rows {
        out.push(render(row.iter().map(String::as_str).collect()));
    }
    out.join("\n")
}
