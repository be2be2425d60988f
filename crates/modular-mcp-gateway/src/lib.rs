//! Modular MCP Gateway
//!
//! Aggregation proxy that provides:
//! - One upstream session per configured group (stdio, streamable HTTP, SSE)
//! - OAuth 2.1 authorization code flow with PKCE for remote upstreams
//! - A process-wide queue so only one browser prompt is open at a time
//! - Two proxy tools: `get-modular-tools` and `call-modular-tool`

pub mod auth;
pub mod error;
pub mod mcp;
pub mod oauth;
pub mod pool;
mod signal;

pub use auth::{
    AuthOutcome, AuthorizationCode, AuthorizationProvider, BrowserLauncher, CallbackListener,
    CallbackOptions, InteractiveCallback, InteractiveGuard, InteractiveLock, InvalidationScope,
    SystemBrowser, DEFAULT_OAUTH_TIMEOUT,
};
pub use error::{GatewayError, Result};
pub use signal::shutdown_signal;
pub use mcp::{ModularProxyHandler, CALL_TOOL_NAME, GET_TOOLS_NAME};
pub use pool::{
    ConnectOutcome, FailedGroupInfo, GroupConnection, GroupInfo, McpClient, McpClientHandler,
    SessionManager, Transport, TransportConnectResult, TransportFactory, TransportOptions,
};
