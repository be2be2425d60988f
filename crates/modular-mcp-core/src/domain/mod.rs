//! Domain types
//!
//! - Server configuration (`ServerConfig`, `McpServerConfig`, `TransportConfig`)
//! - Environment variable substitution for config values
//! - Persisted OAuth credentials keyed by `UpstreamIdentity`

pub mod config;
mod credential;
pub mod env;

pub use config::*;
pub use credential::*;
