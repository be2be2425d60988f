//! Transport abstraction for upstream MCP connections
//!
//! [`TransportFactory`] turns one validated [`TransportConfig`] into a
//! connectable [`Transport`]. HTTP and SSE transports carry an
//! [`AuthorizationProvider`] wired to a lazily started callback listener;
//! stdio transports never authorize.

mod callback_slot;
mod http;
mod remote;
mod sse;
mod stdio;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use modular_mcp_core::{
    branding, CredentialKind, CredentialStore, PersistedCredential, TransportConfig,
    TransportKind, UpstreamIdentity,
};
use tracing::debug;
use url::Url;

pub use callback_slot::CallbackSlot;
pub use http::HttpTransport;
use remote::RemoteEndpoint;
pub use sse::SseTransport;
pub use stdio::StdioTransport;

use super::instance::McpClient;
use crate::auth::{
    AuthOutcome, AuthorizationProvider, BrowserLauncher, InteractiveLock, DEFAULT_OAUTH_TIMEOUT,
};
use crate::error::{GatewayError, Result};

/// Result of a transport connection attempt
pub enum TransportConnectResult {
    /// Handshake completed
    Connected(McpClient),
    /// The server rejected us for lack of credentials
    OAuthRequired { server_url: String },
    Failed(GatewayError),
}

/// One way of reaching an upstream MCP server
#[async_trait]
pub trait Transport: Send + Sync {
    /// Attempt the MCP handshake
    async fn connect(&self) -> TransportConnectResult;

    /// Obtain credentials after [`TransportConnectResult::OAuthRequired`].
    ///
    /// Transports without an authorization story report `Unauthorized`.
    async fn authorize(&self) -> Result<AuthOutcome> {
        Err(GatewayError::Unauthorized)
    }

    fn kind(&self) -> TransportKind;

    /// Short label for logs
    fn description(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub connect_timeout: Duration,
    /// How long an interactive authorization may wait for its redirect
    pub oauth_timeout: Duration,
    /// Callback port used when no port has been persisted for an upstream
    pub default_callback_port: u16,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            oauth_timeout: DEFAULT_OAUTH_TIMEOUT,
            default_callback_port: branding::DEFAULT_OAUTH_CALLBACK_PORT,
        }
    }
}

/// Builds transports that share one credential store, interactive lock and
/// browser launcher
#[derive(Clone)]
pub struct TransportFactory {
    store: Arc<dyn CredentialStore>,
    lock: InteractiveLock,
    browser: Arc<dyn BrowserLauncher>,
    options: TransportOptions,
}

impl TransportFactory {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        lock: InteractiveLock,
        browser: Arc<dyn BrowserLauncher>,
        options: TransportOptions,
    ) -> Self {
        Self {
            store,
            lock,
            browser,
            options,
        }
    }

    /// Create a transport for `group`.
    ///
    /// Remote transports pick up any stored access token so a server that
    /// accepts it never triggers a browser prompt.
    pub async fn create(&self, group: &str, config: &TransportConfig) -> Result<Box<dyn Transport>> {
        match config {
            TransportConfig::Stdio { command, args, env } => Ok(Box::new(StdioTransport::new(
                group,
                command.clone(),
                args.clone(),
                env.clone(),
                self.options.connect_timeout,
            ))),
            TransportConfig::Http { url, headers } => Ok(Box::new(HttpTransport::new(
                self.remote_endpoint(group, TransportKind::Http, url, headers).await?,
            ))),
            TransportConfig::Sse { url, headers } => Ok(Box::new(SseTransport::new(
                self.remote_endpoint(group, TransportKind::Sse, url, headers).await?,
            ))),
        }
    }

    async fn remote_endpoint(
        &self,
        group: &str,
        kind: TransportKind,
        url: &str,
        headers: &std::collections::BTreeMap<String, String>,
    ) -> Result<RemoteEndpoint> {
        let url = Url::parse(url)
            .map_err(|e| GatewayError::ConfigInvalid(format!("invalid url '{}': {}", url, e)))?;
        let identity = UpstreamIdentity::from_url(&url);

        let persisted_port = match self.store.get(&identity, CredentialKind::CallbackPort).await {
            Some(PersistedCredential::CallbackPort(port)) => Some(port),
            _ => None,
        };
        debug!(group, %identity, ?persisted_port, "Creating remote transport");

        let slot = Arc::new(CallbackSlot::new(
            identity,
            persisted_port,
            self.options.default_callback_port,
            self.options.oauth_timeout,
            self.store.clone(),
        ));
        let provider = AuthorizationProvider::new(
            url.clone(),
            slot.preferred_port(),
            self.store.clone(),
            self.lock.clone(),
            self.browser.clone(),
        )
        .with_interactive_callback(slot);
        let access_token = provider.valid_access_token().await;

        Ok(RemoteEndpoint {
            group: group.to_string(),
            kind,
            url,
            headers: headers.clone(),
            access_token,
            provider: Arc::new(provider),
            connect_timeout: self.options.connect_timeout,
        })
    }
}
