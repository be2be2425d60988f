//! Centralized branding constants
//!
//! All product naming comes from this module.
//!
//! # Usage
//!
//! ```rust
//! use modular_mcp_core::branding;
//!
//! println!("App: {}", branding::DISPLAY_NAME);
//! let redirect = branding::oauth_callback_uri_with_port(45819);
//! assert_eq!(redirect, "http://localhost:45819/oauth/callback");
//! ```

/// Human readable product name
pub const DISPLAY_NAME: &str = "Modular MCP";

/// Binary / package name used in protocol handshakes and migrated configs
pub const APP_NAME: &str = "modular-mcp";

/// Name reported to upstream servers when connecting as a client
pub const MCP_CLIENT_NAME: &str = "modular-mcp-client";

/// OAuth client metadata sent during dynamic client registration
pub const OAUTH_CLIENT_NAME: &str = "Modular MCP OAuth Client";
pub const OAUTH_CLIENT_URI: &str = "https://github.com/d-kimuson/modular-mcp";
pub const OAUTH_SOFTWARE_ID: &str = "a8e667eb-1a70-4a87-9a05-8e9d7734f6c7";

/// Path served by the local OAuth callback listener
pub const OAUTH_CALLBACK_PATH: &str = "/oauth/callback";

/// Port tried first for the callback listener when no port has been persisted
pub const DEFAULT_OAUTH_CALLBACK_PORT: u16 = 45819;

/// Data directory under the user's home (`~/.modular-mcp`)
pub const DATA_DIR: &str = ".modular-mcp";

/// Subdirectory of [`DATA_DIR`] holding per-upstream OAuth artifacts
pub const OAUTH_SERVERS_DIR: &str = "oauth-servers";

/// File name written by `migrate` when no output path is given
pub const DEFAULT_CONFIG_FILE: &str = "modular-mcp.json";

/// JSON schema referenced from generated config files
pub const CONFIG_SCHEMA_URL: &str =
    "https://raw.githubusercontent.com/d-kimuson/modular-mcp/refs/heads/main/config-schema.json";

/// Log file prefix for the rolling file appender
pub const LOG_PREFIX: &str = "modular-mcp";

/// Build the OAuth redirect URI for a callback listener bound to `port`
pub fn oauth_callback_uri_with_port(port: u16) -> String {
    format!("http://localhost:{}{}", port, OAUTH_CALLBACK_PATH)
}
