// src/commands/mcp.rs

//! Model Context Protocol integration.
//!
//! `setup` registers `hs mcp start` with AI clients by editing their JSON
//! config. `start` runs the HubSpot MCP server as a child process speaking
//! MCP over the inherited stdio.

use anyhow::{bail, Context as _, Result};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as TokioCommand;

use crate::cli::{McpClient, McpCommand};
use crate::context::Context;
use crate::prompts;
use crate::util::{read_json, write_json};

pub const SERVER_NAME: &str = "hubspot-cli-mcp";
pub const DEFAULT_SERVER_COMMAND: &str = "npx -y @hubspot/mcp-server";
/// Overrides the server command line (parsed with shell quoting rules).
pub const SERVER_COMMAND_ENV: &str = "HUBSPOT_MCP_SERVER_COMMAND";
pub const AI_AGENT_ENV: &str = "HUBSPOT_MCP_AI_AGENT";

/// Grace period for the server to exit after Ctrl-C before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub async fn handle(ctx: &mut Context, command: McpCommand) -> Result<()> {
    match command {
        McpCommand::Setup { clients } => setup(ctx, clients),
        McpCommand::Start { ai_agent } => {
            let account_id = ctx.account().ok().map(|a| a.account_id);
            let override_cmd = std::env::var(SERVER_COMMAND_ENV).ok();
            start(override_cmd.as_deref(), ai_agent.as_deref(), account_id).await
        }
    }
}

impl McpClient {
    fn label(&self) -> &'static str {
        match self {
            McpClient::Claude => "Claude",
            McpClient::Cursor => "Cursor",
            McpClient::Windsurf => "Windsurf",
            McpClient::Vscode => "VS Code",
        }
    }

    fn agent_name(&self) -> &'static str {
        match self {
            McpClient::Claude => "claude",
            McpClient::Cursor => "cursor",
            McpClient::Windsurf => "windsurf",
            McpClient::Vscode => "vscode",
        }
    }

    /// Config file the client reads MCP servers from.
    fn config_path(&self, home: &Path, config_dir: &Path, cwd: &Path) -> PathBuf {
        match self {
            McpClient::Claude => config_dir.join("Claude").join("claude_desktop_config.json"),
            McpClient::Cursor => home.join(".cursor").join("mcp.json"),
            McpClient::Windsurf => home.join(".codeium").join("windsurf").join("mcp_config.json"),
            McpClient::Vscode => cwd.join(".vscode").join("mcp.json"),
        }
    }

    /// Top-level key holding the server map.
    fn servers_key(&self) -> &'static str {
        match self {
            McpClient::Vscode => "servers",
            _ => "mcpServers",
        }
    }
}

const ALL_CLIENTS: [McpClient; 4] = [
    McpClient::Claude,
    McpClient::Cursor,
    McpClient::Windsurf,
    McpClient::Vscode,
];

pub fn server_entry(client: McpClient) -> Value {
    let mut entry = json!({
        "command": "hs",
        "args": ["mcp", "start", "--ai-agent", client.agent_name()],
    });
    if client == McpClient::Vscode {
        entry["type"] = json!("stdio");
    }
    entry
}

/// Insert (or replace) our server entry in a client config file.
pub fn write_entry(path: &Path, servers_key: &str, entry: Value) -> Result<()> {
    let mut config = if path.is_file() {
        read_json(path)?
    } else {
        Value::Object(Map::new())
    };

    let root = config
        .as_object_mut()
        .with_context(|| format!("{} is not a JSON object", path.display()))?;
    let servers = root
        .entry(servers_key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    let servers = servers
        .as_object_mut()
        .with_context(|| format!("`{}` in {} is not an object", servers_key, path.display()))?;
    servers.insert(SERVER_NAME.to_string(), entry);

    write_json(path, &config)
}

fn setup(ctx: &Context, clients: Vec<McpClient>) -> Result<()> {
    let clients = if clients.is_empty() {
        let labels: Vec<&str> = ALL_CLIENTS.iter().map(McpClient::label).collect();
        let i = prompts::select(ctx.interactive, "Which client should use the HubSpot MCP server?", &labels, "--client")?;
        vec![ALL_CLIENTS[i]]
    } else {
        clients
    };

    let home = dirs::home_dir().context("Unable to determine home directory")?;
    let config_dir = dirs::config_dir().unwrap_or_else(|| home.join(".config"));
    let cwd = std::env::current_dir()?;

    for client in clients {
        let path = client.config_path(&home, &config_dir, &cwd);
        write_entry(&path, client.servers_key(), server_entry(client))?;
        tracing::info!("Configured {} ({})", client.label(), path.display());
    }
    tracing::info!("Restart the client to pick up the HubSpot MCP server");
    Ok(())
}

/// Program and arguments for the MCP server process.
pub fn server_command(override_cmd: Option<&str>) -> Result<(String, Vec<String>)> {
    let line = override_cmd.unwrap_or(DEFAULT_SERVER_COMMAND);
    let mut words = shell_words::split(line)
        .with_context(|| format!("Invalid MCP server command: {}", line))?;
    if words.is_empty() {
        bail!("MCP server command is empty");
    }
    let program = words.remove(0);
    Ok((program, words))
}

async fn start(
    override_cmd: Option<&str>,
    ai_agent: Option<&str>,
    account_id: Option<u64>,
) -> Result<()> {
    let (program, args) = server_command(override_cmd)?;
    tracing::debug!(program = %program, ?args, "starting MCP server");

    let mut cmd = TokioCommand::new(&program);
    cmd.args(&args)
        .env(AI_AGENT_ENV, ai_agent.unwrap_or("unknown"))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    if let Some(id) = account_id {
        cmd.env("HUBSPOT_ACCOUNT_ID", id.to_string());
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to start MCP server ({})", program))?;

    let status = tokio::select! {
        status = child.wait() => status?,
        _ = tokio::signal::ctrl_c() => {
            // the terminal already delivered SIGINT to the child's process group
            match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    tracing::warn!("MCP server did not exit; killing it");
                    child.kill().await?;
                    return Ok(());
                }
            }
        }
    };

    if !status.success() {
        bail!("MCP server exited with {}", status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_server_command() {
        let (program, args) = server_command(None).unwrap();
        assert_eq!(program, "npx");
        assert_eq!(args, vec!["-y", "@hubspot/mcp-server"]);

        let (program, args) = server_command(Some("node 'my server.js' --port 1")).unwrap();
        assert_eq!(program, "node");
        assert_eq!(args, vec!["my server.js", "--port", "1"]);

        assert!(server_command(Some("   ")).is_err());
    }

    #[test]
    fn merges_into_existing_client_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mcp.json");
        std::fs::write(
            &path,
            r#"{"mcpServers":{"other":{"command":"x"}},"theme":"dark"}"#,
        )
        .unwrap();

        write_entry(&path, "mcpServers", server_entry(McpClient::Cursor)).unwrap();

        let written = read_json(&path).unwrap();
        assert_eq!(written["theme"], "dark");
        assert_eq!(written["mcpServers"]["other"]["command"], "x");
        assert_eq!(
            written["mcpServers"][SERVER_NAME]["args"],
            json!(["mcp", "start", "--ai-agent", "cursor"])
        );
    }

    #[test]
    fn vscode_uses_servers_key_in_workspace() {
        let tmp = tempfile::tempdir().unwrap();
        let path = McpClient::Vscode.config_path(tmp.path(), tmp.path(), tmp.path());
        assert!(path.ends_with(".vscode/mcp.json"));

        write_entry(&path, McpClient::Vscode.servers_key(), server_entry(McpClient::Vscode)).unwrap();
        let written = read_json(&path).unwrap();
        assert_eq!(written["servers"][SERVER_NAME]["type"], "stdio");
    }

    #[tokio::test]
    async fn failing_server_is_an_error() {
        // `false` exists on every unix CI image
        if cfg!(unix) {
            let err = start(Some("false"), Some("test"), None).await.unwrap_err();
            assert!(err.to_string().contains("exited"));
        }
    }
}
