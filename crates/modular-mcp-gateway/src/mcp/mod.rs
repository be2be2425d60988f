//! MCP server surface exposed to the model client
//!
//! Only two tools are advertised; upstream tools are discovered through
//! `get-modular-tools` and invoked through `call-modular-tool`.

pub mod handler;

pub use handler::{ModularProxyHandler, CALL_TOOL_NAME, GET_TOOLS_NAME};
