//! Modular MCP proxy handler
//!
//! Implements the MCP ServerHandler trait on top of the [`SessionManager`].
//! Failures below the protocol boundary are turned into error-flagged
//! results carrying `{"success": false, "error": ...}`.

use std::sync::Arc;

use modular_mcp_core::branding;
use rmcp::{
    model::*,
    service::RequestContext,
    ErrorData as McpError, RoleServer, ServerHandler,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::pool::SessionManager;

pub const GET_TOOLS_NAME: &str = "get-modular-tools";
pub const CALL_TOOL_NAME: &str = "call-modular-tool";

#[derive(Debug, Deserialize)]
struct GetToolsArgs {
    group: String,
}

#[derive(Debug, Deserialize)]
struct CallToolArgs {
    group: String,
    name: String,
    #[serde(default)]
    args: Option<JsonObject>,
}

/// Upstream tool as re-exposed to the model
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDescriptor {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    input_schema: JsonObject,
}

impl From<&Tool> for ToolDescriptor {
    fn from(tool: &Tool) -> Self {
        let mut input_schema = tool.input_schema.as_ref().clone();
        input_schema.remove("$schema");
        Self {
            name: tool.name.to_string(),
            description: tool.description.as_ref().map(|d| d.to_string()),
            input_schema,
        }
    }
}

#[derive(Clone)]
pub struct ModularProxyHandler {
    sessions: Arc<SessionManager>,
}

impl ModularProxyHandler {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    /// The two proxy tools, with the current group names as the `group` enum
    pub fn tools(&self) -> Vec<Tool> {
        let groups = self.sessions.list_groups();
        let group_names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();

        let mut description = format!(
            "{} manages multiple MCP servers as organized groups, providing only the necessary \
             group's tool descriptions to the LLM on demand instead of overwhelming it with all \
             tool descriptions at once.\n\nUse this tool to retrieve available tools in a \
             specific group, then use {} to execute them.\n\nAvailable groups:\n{}",
            branding::APP_NAME,
            CALL_TOOL_NAME,
            groups
                .iter()
                .map(|g| format!("- {}: {}", g.name, g.description))
                .collect::<Vec<_>>()
                .join("\n"),
        );

        let failed = self.sessions.list_failed_groups();
        if !failed.is_empty() {
            description.push_str("\n\nUnavailable groups (failed to connect):\n");
            description.push_str(
                &failed
                    .iter()
                    .map(|g| format!("- {}: {} (error: {})", g.name, g.description, g.cause))
                    .collect::<Vec<_>>()
                    .join("\n"),
            );
        }

        let get_tools_schema = json!({
            "type": "object",
            "properties": {
                "group": {
                    "type": "string",
                    "description": "The name of the MCP group to get tools from",
                    "enum": group_names,
                }
            },
            "required": ["group"],
        });

        let call_tool_schema = json!({
            "type": "object",
            "properties": {
                "group": {
                    "type": "string",
                    "description": "The name of the MCP group containing the tool",
                    "enum": group_names,
                },
                "name": {
                    "type": "string",
                    "description": "The name of the tool to execute",
                },
                "args": {
                    "type": "object",
                    "description": "Arguments to pass to the tool",
                    "additionalProperties": true,
                }
            },
            "required": ["group", "name"],
        });

        vec![
            Tool::new(GET_TOOLS_NAME, description, schema_object(get_tools_schema)),
            Tool::new(
                CALL_TOOL_NAME,
                format!(
                    "Execute a tool from a specific MCP group. Proxies the call to the \
                     appropriate upstream MCP server. Use {} first to discover available tools \
                     and their input schemas in the specified group, then use this tool to \
                     execute them. This maintains a clean separation between discovery \
                     (context-efficient) and execution phases, enabling effective management \
                     of large tool collections across multiple MCP servers.",
                    GET_TOOLS_NAME
                ),
                schema_object(call_tool_schema),
            ),
        ]
    }

    /// `get-modular-tools`: the group's tools with `$schema` stripped
    pub fn get_tools(&self, arguments: Option<JsonObject>) -> CallToolResult {
        let args: GetToolsArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(message) => return error_result(message),
        };

        match self.sessions.list_tools(&args.group) {
            Ok(tools) => {
                let descriptors: Vec<ToolDescriptor> = tools.iter().map(ToolDescriptor::from).collect();
                debug!(group = %args.group, count = descriptors.len(), "get-modular-tools");
                match serde_json::to_string(&descriptors) {
                    Ok(text) => CallToolResult {
                        content: vec![Content::text(text)],
                        structured_content: None,
                        is_error: None,
                        meta: None,
                    },
                    Err(e) => error_result(e.to_string()),
                }
            }
            Err(e) => error_result(e.to_string()),
        }
    }

    /// `call-modular-tool`: forward to the upstream, result passed through
    pub async fn call_upstream(&self, arguments: Option<JsonObject>) -> CallToolResult {
        let args: CallToolArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(message) => return error_result(message),
        };

        info!(group = %args.group, tool = %args.name, "call-modular-tool");
        match self
            .sessions
            .call_tool(&args.group, &args.name, Some(args.args.unwrap_or_default()))
            .await
        {
            Ok(result) => result,
            Err(e) => error_result(e.to_string()),
        }
    }
}

impl ServerHandler for ModularProxyHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools_with(ToolsCapability {
                    list_changed: Some(false),
                })
                .build(),
            server_info: Implementation {
                name: branding::APP_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(format!(
                "{} groups tools from several MCP servers. Call {} to list a group's tools, \
                 then {} to run one.",
                branding::DISPLAY_NAME,
                GET_TOOLS_NAME,
                CALL_TOOL_NAME
            )),
        }
    }

    async fn list_tools(
        &self,
        _params: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.tools()))
    }

    async fn call_tool(
        &self,
        params: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        match params.name.as_ref() {
            GET_TOOLS_NAME => Ok(self.get_tools(params.arguments)),
            CALL_TOOL_NAME => Ok(self.call_upstream(params.arguments).await),
            other => Err(McpError::invalid_params(
                format!("Unknown tool: {}", other),
                None,
            )),
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: Option<JsonObject>) -> Result<T, String> {
    serde_json::from_value(Value::Object(arguments.unwrap_or_default()))
        .map_err(|e| format!("invalid arguments: {}", e))
}

fn error_result(message: String) -> CallToolResult {
    let payload = json!({ "success": false, "error": message });
    CallToolResult {
        content: vec![Content::text(payload.to_string())],
        structured_content: None,
        is_error: Some(true),
        meta: None,
    }
}

fn schema_object(value: Value) -> Arc<JsonObject> {
    match value {
        Value::Object(map) => Arc::new(map),
        _ => Arc::new(JsonObject::new()),
    }
}
