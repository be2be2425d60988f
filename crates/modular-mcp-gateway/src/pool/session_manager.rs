//! Session manager: one upstream session (or recorded failure) per group
//!
//! The startup sweep connects every configured group concurrently; a group
//! that fails is recorded with its cause and never takes the others down.
//! HTTP and SSE groups that answer the first handshake with 401 get exactly
//! one authorization flow and one reconnect.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use modular_mcp_core::{McpServerConfig, ServerConfig, TransportConfig};
use rmcp::model::{CallToolRequestParams, CallToolResult, JsonObject, Tool};
use tracing::{debug, error, info, warn};

use super::instance::McpClient;
use super::transport::{TransportConnectResult, TransportFactory};
use crate::error::{GatewayError, Result};

/// Connection state of one configured group
pub enum GroupConnection {
    Connected {
        name: String,
        description: String,
        client: McpClient,
        tools: Vec<Tool>,
    },
    Failed {
        name: String,
        description: String,
        cause: String,
    },
}

impl GroupConnection {
    pub fn name(&self) -> &str {
        match self {
            GroupConnection::Connected { name, .. } | GroupConnection::Failed { name, .. } => name,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            GroupConnection::Connected { description, .. }
            | GroupConnection::Failed { description, .. } => description,
        }
    }
}

/// A connected group as shown to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedGroupInfo {
    pub name: String,
    pub description: String,
    pub cause: String,
}

/// Per-group result of [`SessionManager::connect_all`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected { group: String, tool_count: usize },
    Failed { group: String, cause: String },
}

pub struct SessionManager {
    factory: TransportFactory,
    groups: DashMap<String, GroupConnection>,
}

impl SessionManager {
    pub fn new(factory: TransportFactory) -> Arc<Self> {
        Arc::new(Self {
            factory,
            groups: DashMap::new(),
        })
    }

    /// Connect one group and cache its tool list.
    ///
    /// Does nothing if the group already has an entry. Errors propagate;
    /// recording them is up to the caller.
    pub async fn connect(&self, name: &str, config: &McpServerConfig) -> Result<()> {
        if self.groups.contains_key(name) {
            debug!(group = name, "Group already present, skipping connect");
            return Ok(());
        }

        let client = self.establish(name, &config.transport).await?;
        let tools = match client.list_all_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                if let Err(join_err) = client.cancel().await {
                    warn!(group = name, "Failed to close session: {}", join_err);
                }
                return Err(e.into());
            }
        };

        info!(group = name, tools = tools.len(), "Group connected");
        self.groups.insert(
            name.to_string(),
            GroupConnection::Connected {
                name: name.to_string(),
                description: config.description.clone(),
                client,
                tools,
            },
        );
        Ok(())
    }

    async fn establish(&self, name: &str, config: &TransportConfig) -> Result<McpClient> {
        let transport = self.factory.create(name, config).await?;
        debug!(group = name, transport = %transport.description(), "Connecting");

        match transport.connect().await {
            TransportConnectResult::Connected(client) => return Ok(client),
            TransportConnectResult::Failed(err) => return Err(err),
            TransportConnectResult::OAuthRequired { server_url } => {
                info!(group = name, %server_url, "Authorization required");
                let outcome = transport.authorize().await?;
                debug!(group = name, ?outcome, "Authorization finished, reconnecting");
            }
        }

        // Rebuilt so the new access token is sent from the first request
        let transport = self.factory.create(name, config).await?;
        match transport.connect().await {
            TransportConnectResult::Connected(client) => Ok(client),
            TransportConnectResult::OAuthRequired { .. } => Err(GatewayError::Unauthorized),
            TransportConnectResult::Failed(err) => Err(err),
        }
    }

    /// Record a terminal connection failure; an existing entry is kept
    pub fn record_failure(&self, name: &str, config: &McpServerConfig, cause: impl Into<String>) {
        self.groups
            .entry(name.to_string())
            .or_insert_with(|| GroupConnection::Failed {
                name: name.to_string(),
                description: config.description.clone(),
                cause: cause.into(),
            });
    }

    /// Connected groups, sorted by name
    pub fn list_groups(&self) -> Vec<GroupInfo> {
        let mut groups: Vec<GroupInfo> = self
            .groups
            .iter()
            .filter_map(|entry| match entry.value() {
                GroupConnection::Connected {
                    name, description, ..
                } => Some(GroupInfo {
                    name: name.clone(),
                    description: description.clone(),
                }),
                GroupConnection::Failed { .. } => None,
            })
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        groups
    }

    /// Groups whose connection failed, sorted by name
    pub fn list_failed_groups(&self) -> Vec<FailedGroupInfo> {
        let mut groups: Vec<FailedGroupInfo> = self
            .groups
            .iter()
            .filter_map(|entry| match entry.value() {
                GroupConnection::Failed {
                    name,
                    description,
                    cause,
                } => Some(FailedGroupInfo {
                    name: name.clone(),
                    description: description.clone(),
                    cause: cause.clone(),
                }),
                GroupConnection::Connected { .. } => None,
            })
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        groups
    }

    pub fn list_tools(&self, group: &str) -> Result<Vec<Tool>> {
        let entry = self
            .groups
            .get(group)
            .ok_or_else(|| GatewayError::GroupNotConnected(group.to_string()))?;
        match entry.value() {
            GroupConnection::Connected { tools, .. } => Ok(tools.clone()),
            GroupConnection::Failed { cause, .. } => Err(GatewayError::GroupFailed {
                group: group.to_string(),
                cause: cause.clone(),
            }),
        }
    }

    /// Forward a tool call; tool-level errors come back in the result untouched
    pub async fn call_tool(
        &self,
        group: &str,
        tool: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult> {
        let peer = {
            let entry = self
                .groups
                .get(group)
                .ok_or_else(|| GatewayError::GroupNotConnected(group.to_string()))?;
            match entry.value() {
                GroupConnection::Connected { client, .. } => client.peer().clone(),
                GroupConnection::Failed { cause, .. } => {
                    return Err(GatewayError::GroupFailed {
                        group: group.to_string(),
                        cause: cause.clone(),
                    })
                }
            }
        };

        debug!(group, tool, "Calling upstream tool");
        let result = peer
            .call_tool(CallToolRequestParams {
                meta: None,
                name: tool.to_string().into(),
                arguments,
                task: None,
            })
            .await?;
        Ok(result)
    }

    /// Close the group's session and forget it
    pub async fn disconnect(&self, group: &str) -> Result<()> {
        let Some((_, connection)) = self.groups.remove(group) else {
            return Ok(());
        };
        match connection {
            GroupConnection::Connected { client, .. } => {
                client.cancel().await.map_err(|e| {
                    GatewayError::TransportUnavailable(format!("failed to close session: {}", e))
                })?;
                info!(group, "Group disconnected");
            }
            GroupConnection::Failed { .. } => {}
        }
        Ok(())
    }

    /// Disconnect every group concurrently; individual failures are logged
    pub async fn disconnect_all(&self) {
        let names: Vec<String> = self.groups.iter().map(|e| e.key().clone()).collect();
        let results = join_all(names.iter().map(|name| self.disconnect(name))).await;
        for (name, result) in names.iter().zip(results) {
            if let Err(e) = result {
                warn!(group = %name, "Disconnect failed: {}", e);
            }
        }
    }

    /// Connect all configured groups concurrently, recording failures
    pub async fn connect_all(&self, config: &ServerConfig) -> Vec<ConnectOutcome> {
        let attempts = config.mcp_servers.iter().map(|(name, server)| async move {
            match self.connect(name, server).await {
                Ok(()) => {
                    let tool_count = self.list_tools(name).map(|t| t.len()).unwrap_or(0);
                    info!(group = %name, "connected ({} tools)", tool_count);
                    ConnectOutcome::Connected {
                        group: name.clone(),
                        tool_count,
                    }
                }
                Err(e) => {
                    let cause = e.to_string();
                    error!(group = %name, "failed: {}", cause);
                    self.record_failure(name, server, cause.clone());
                    ConnectOutcome::Failed {
                        group: name.clone(),
                        cause,
                    }
                }
            }
        });
        join_all(attempts).await
    }
}
