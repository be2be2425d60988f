//! STDIO transport for MCP servers
//!
//! Spawns the configured command as a child process speaking MCP over
//! stdin/stdout. The child's stderr is inherited so its diagnostics land next
//! to ours.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use modular_mcp_core::TransportKind;
use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
use rmcp::ServiceExt;
use tokio::process::Command;
use tracing::{debug, error, info};

use super::{Transport, TransportConnectResult};
use crate::error::GatewayError;
use crate::pool::instance::McpClientHandler;

pub struct StdioTransport {
    group: String,
    command: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    connect_timeout: Duration,
}

impl StdioTransport {
    pub fn new(
        group: &str,
        command: String,
        args: Vec<String>,
        env: BTreeMap<String, String>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            group: group.to_string(),
            command,
            args,
            env,
            connect_timeout,
        }
    }

    fn failed(&self, err: String) -> TransportConnectResult {
        error!(group = %self.group, "{}", err);
        TransportConnectResult::Failed(GatewayError::TransportUnavailable(err))
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn connect(&self) -> TransportConnectResult {
        info!(
            group = %self.group,
            command = %self.command,
            "Connecting to STDIO server"
        );

        let command_path = match which::which(&self.command)
            .or_else(|_| which::which(format!("{}.exe", &self.command)))
        {
            Ok(path) => path,
            Err(_) => {
                return self.failed(format!(
                    "Command not found: {}. Ensure it's installed and in PATH.",
                    self.command
                ))
            }
        };
        debug!(group = %self.group, path = ?command_path, "Found command");

        let args = self.args.clone();
        let env = self.env.clone();
        let transport =
            match TokioChildProcess::new(Command::new(&command_path).configure(move |cmd| {
                cmd.args(&args)
                    .envs(&env)
                    .stderr(Stdio::inherit())
                    .kill_on_drop(true);
            })) {
                Ok(t) => t,
                Err(e) => return self.failed(format!("Failed to spawn process: {}", e)),
            };

        let connect_future = McpClientHandler::new(&self.group).serve(transport);
        match tokio::time::timeout(self.connect_timeout, connect_future).await {
            Ok(Ok(client)) => {
                info!(group = %self.group, "STDIO server connected");
                TransportConnectResult::Connected(client)
            }
            Ok(Err(e)) => self.failed(format!("MCP handshake failed: {}", e)),
            Err(_) => self.failed(format!("Connection timeout ({:?})", self.connect_timeout)),
        }
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Stdio
    }

    fn description(&self) -> String {
        format!("stdio:{}", self.command)
    }
}
