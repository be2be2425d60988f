//! Outbound OAuth for upstream MCP servers
//!
//! - [`InteractiveLock`]: one browser prompt at a time, process wide
//! - [`CallbackListener`]: local redirect endpoint, one code per listener
//! - [`AuthorizationProvider`]: per-host client identity and flow driver

mod browser;
mod callback;
mod lock;
mod provider;

pub use browser::{sanitize_url, BrowserLauncher, SystemBrowser};
pub use callback::{AuthorizationCode, CallbackListener, CallbackOptions, DEFAULT_OAUTH_TIMEOUT};
pub use lock::{InteractiveGuard, InteractiveLock};
pub use provider::{AuthOutcome, AuthorizationProvider, InteractiveCallback, InvalidationScope};
