//! Upstream client session

use rmcp::model::{ClientCapabilities, ClientInfo, Implementation, LoggingLevel};
use rmcp::service::{NotificationContext, RunningService};
use rmcp::RoleClient;
use tracing::{debug, error, info, warn};

use modular_mcp_core::branding;

/// Type alias for the MCP client service
pub type McpClient = RunningService<RoleClient, McpClientHandler>;

/// Client handler for one upstream group
#[derive(Debug, Clone)]
pub struct McpClientHandler {
    info: ClientInfo,
    group: String,
}

impl McpClientHandler {
    pub fn new(group: &str) -> Self {
        Self {
            info: ClientInfo {
                protocol_version: Default::default(),
                capabilities: ClientCapabilities::default(),
                client_info: Implementation {
                    name: branding::MCP_CLIENT_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    title: Some(branding::DISPLAY_NAME.to_string()),
                    ..Default::default()
                },
                meta: None,
            },
            group: group.to_string(),
        }
    }
}

impl rmcp::ClientHandler for McpClientHandler {
    fn get_info(&self) -> ClientInfo {
        self.info.clone()
    }

    fn on_tool_list_changed(
        &self,
        _context: NotificationContext<RoleClient>,
    ) -> impl std::future::Future<Output = ()> + Send + '_ {
        let group = self.group.clone();
        async move {
            info!(group = %group, "Upstream sent tools/list_changed; tool list is fixed until reconnect");
        }
    }

    // Upstream log notifications are re-emitted on our own log stream
    fn on_logging_message(
        &self,
        params: rmcp::model::LoggingMessageNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) -> impl std::future::Future<Output = ()> + Send + '_ {
        let group = self.group.clone();
        async move {
            let message = match &params.data {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            match params.level {
                LoggingLevel::Debug => debug!(group = %group, logger = ?params.logger, "{}", message),
                LoggingLevel::Info | LoggingLevel::Notice => {
                    info!(group = %group, logger = ?params.logger, "{}", message)
                }
                LoggingLevel::Warning => warn!(group = %group, logger = ?params.logger, "{}", message),
                LoggingLevel::Error
                | LoggingLevel::Critical
                | LoggingLevel::Alert
                | LoggingLevel::Emergency => {
                    error!(group = %group, logger = ?params.logger, "{}", message)
                }
            }
        }
    }
}
