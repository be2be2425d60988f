//! Upstream connection pool
//!
//! - [`TransportFactory`]: builds stdio / HTTP / SSE transports
//! - [`SessionManager`]: group name to live session or recorded failure

mod instance;
mod session_manager;
pub mod transport;

pub use instance::{McpClient, McpClientHandler};
pub use session_manager::{
    ConnectOutcome, FailedGroupInfo, GroupConnection, GroupInfo, SessionManager,
};
pub use transport::{
    Transport, TransportConnectResult, TransportFactory, TransportOptions,
};
