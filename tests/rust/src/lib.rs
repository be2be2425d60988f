//! Shared fixtures for Modular MCP integration tests.

use std::sync::Arc;
use std::time::Duration;

use modular_mcp_core::CredentialStore;
use modular_mcp_gateway::{
    BrowserLauncher, InteractiveLock, SessionManager, TransportFactory, TransportOptions,
};
use modular_mcp_storage::FileCredentialStore;
use tempfile::TempDir;

/// Scripted browsers for interactive authorization
pub mod browser;
pub use browser::{RedirectingBrowser, SilentBrowser, TimedBrowser};

pub use upstream::{
    count_requests, serve_mcp, start_authorization_server, start_protected_sse_upstream,
    start_protected_upstream, start_sse_upstream, start_upstream, TestUpstream,
};

/// Credential store rooted in a fresh temp directory.
///
/// Keep the `TempDir` alive for the duration of the test.
pub fn temp_store() -> (TempDir, Arc<dyn CredentialStore>) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let store: Arc<dyn CredentialStore> = Arc::new(FileCredentialStore::new(dir.path()));
    (dir, store)
}

/// Factory whose callback listeners bind ephemeral ports
pub fn test_factory(
    store: Arc<dyn CredentialStore>,
    browser: Arc<dyn BrowserLauncher>,
    oauth_timeout: Duration,
) -> TransportFactory {
    test_factory_with_callback_port(store, browser, oauth_timeout, 0)
}

/// Factory whose first-time authorizations try `callback_port` first
pub fn test_factory_with_callback_port(
    store: Arc<dyn CredentialStore>,
    browser: Arc<dyn BrowserLauncher>,
    oauth_timeout: Duration,
    callback_port: u16,
) -> TransportFactory {
    TransportFactory::new(
        store,
        InteractiveLock::new(),
        browser,
        TransportOptions {
            connect_timeout: Duration::from_secs(10),
            oauth_timeout,
            default_callback_port: callback_port,
        },
    )
}

/// A localhost port that was free a moment ago
pub fn unused_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .expect("bind to random port")
}

pub fn test_session_manager(
    store: Arc<dyn CredentialStore>,
    browser: Arc<dyn BrowserLauncher>,
) -> Arc<SessionManager> {
    SessionManager::new(test_factory(store, browser, Duration::from_secs(5)))
}

/// Route gateway logs to the test output; `RUST_LOG` selects the level
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
