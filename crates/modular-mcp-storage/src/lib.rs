//! Modular MCP Storage Layer
//!
//! OAuth artifacts live in small files, one directory per upstream identity.
//!
//! # Layout
//!
//! ```text
//! ~/.modular-mcp/oauth-servers/
//! └── <sha256(host)>/
//!     ├── client.json      registered client
//!     ├── tokens.json      access / refresh token pair
//!     ├── verifier.txt     PKCE code verifier
//!     └── callback-port    last redirect port
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use modular_mcp_storage::FileCredentialStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(FileCredentialStore::new(default_credentials_dir()?));
//! ```

mod error;
mod repositories;

pub use error::StorageError;
pub use repositories::*;

use modular_mcp_core::branding;
use std::path::PathBuf;

/// Default base directory for OAuth artifacts (`~/.modular-mcp/oauth-servers`)
pub fn default_credentials_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(branding::DATA_DIR).join(branding::OAUTH_SERVERS_DIR))
}
