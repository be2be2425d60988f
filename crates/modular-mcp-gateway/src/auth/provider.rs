//! Per-upstream OAuth client
//!
//! Holds the client identity for one upstream host and drives the flow:
//! discovery, refresh, dynamic registration, PKCE, the browser hop and the
//! code exchange. Everything it learns is persisted through the
//! [`CredentialStore`] under the upstream's identity.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use modular_mcp_core::{
    branding, ClientMetadata, ClientRegistration, CredentialKind, CredentialStore,
    PersistedCredential, TokenPair, UpstreamIdentity,
};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use url::Url;

use super::browser::{sanitize_url, BrowserLauncher};
use super::callback::AuthorizationCode;
use super::lock::InteractiveLock;
use crate::error::{GatewayError, Result};
use crate::oauth::{register_client, DiscoveredServer, OAuthDiscovery, OAuthFlow, PkceChallenge};

/// Source of the authorization code for an interactive flow
#[async_trait]
pub trait InteractiveCallback: Send + Sync {
    /// Make sure a listener is bound; returns the port the redirect URI must use
    async fn prepare(&self) -> Result<u16>;

    /// Wait for the redirect on the prepared listener
    async fn await_code(&self) -> Result<AuthorizationCode>;

    /// Stop a prepared listener without waiting for a code
    async fn cancel(&self) {}
}

/// Which artifacts [`AuthorizationProvider::invalidate_credentials`] removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationScope {
    All,
    Client,
    Tokens,
    Verifier,
}

impl InvalidationScope {
    fn includes(self, kind: CredentialKind) -> bool {
        match self {
            InvalidationScope::All => true,
            InvalidationScope::Client => kind == CredentialKind::Client,
            InvalidationScope::Tokens => kind == CredentialKind::Tokens,
            InvalidationScope::Verifier => kind == CredentialKind::Verifier,
        }
    }
}

/// How [`AuthorizationProvider::authorize`] obtained fresh tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Refreshed without user interaction
    Refreshed,
    /// Completed a browser authorization
    Interactive,
}

#[derive(Clone)]
struct AuthContext {
    server: DiscoveredServer,
    resource: Option<Url>,
}

pub struct AuthorizationProvider {
    identity: UpstreamIdentity,
    server_url: Url,
    authorize_resource: Option<String>,
    store: Arc<dyn CredentialStore>,
    lock: InteractiveLock,
    browser: Arc<dyn BrowserLauncher>,
    callback: Option<Arc<dyn InteractiveCallback>>,
    callback_port: AtomicU16,
    state: String,
    http_client: reqwest::Client,
    context: Mutex<Option<AuthContext>>,
}

impl AuthorizationProvider {
    pub fn new(
        server_url: Url,
        callback_port: u16,
        store: Arc<dyn CredentialStore>,
        lock: InteractiveLock,
        browser: Arc<dyn BrowserLauncher>,
    ) -> Self {
        Self {
            identity: UpstreamIdentity::from_url(&server_url),
            server_url,
            authorize_resource: None,
            store,
            lock,
            browser,
            callback: None,
            callback_port: AtomicU16::new(callback_port),
            state: uuid::Uuid::new_v4().to_string(),
            http_client: reqwest::Client::new(),
            context: Mutex::new(None),
        }
    }

    pub fn with_interactive_callback(mut self, callback: Arc<dyn InteractiveCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Pin the `resource` parameter sent with the authorization request
    pub fn with_authorize_resource(mut self, resource: impl Into<String>) -> Self {
        self.authorize_resource = Some(resource.into());
        self
    }

    /// Anti-CSRF value generated once per provider
    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn callback_port(&self) -> u16 {
        self.callback_port.load(Ordering::SeqCst)
    }

    pub fn redirect_url(&self) -> String {
        branding::oauth_callback_uri_with_port(self.callback_port())
    }

    pub fn client_metadata(&self) -> ClientMetadata {
        ClientMetadata {
            redirect_uris: vec![self.redirect_url()],
            client_name: Some(branding::OAUTH_CLIENT_NAME.to_string()),
            client_uri: Some(branding::OAUTH_CLIENT_URI.to_string()),
            software_id: Some(branding::OAUTH_SOFTWARE_ID.to_string()),
            software_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            grant_types: vec!["authorization_code".to_string(), "refresh_token".to_string()],
            response_types: vec!["code".to_string()],
            token_endpoint_auth_method: Some("none".to_string()),
        }
    }

    /// Stored registration, only while its redirect URI still matches this
    /// provider's callback port
    pub async fn client_information(&self) -> Option<ClientRegistration> {
        match self.store.get(&self.identity, CredentialKind::Client).await {
            Some(PersistedCredential::Client(client)) => {
                if client.matches_redirect_uri(&self.redirect_url()) {
                    Some(client)
                } else {
                    debug!(
                        identity = %self.identity,
                        registered = ?client.redirect_uri(),
                        "Stored client registered for another redirect URI"
                    );
                    None
                }
            }
            _ => None,
        }
    }

    pub async fn save_client_information(&self, client: &ClientRegistration) -> Result<()> {
        self.put(PersistedCredential::Client(client.clone())).await
    }

    pub async fn tokens(&self) -> Option<TokenPair> {
        match self.store.get(&self.identity, CredentialKind::Tokens).await {
            Some(PersistedCredential::Tokens(tokens)) => Some(tokens),
            _ => None,
        }
    }

    pub async fn save_tokens(&self, tokens: &TokenPair) -> Result<()> {
        self.put(PersistedCredential::Tokens(tokens.clone())).await
    }

    /// Access token usable as a bearer header right now
    pub async fn valid_access_token(&self) -> Option<String> {
        self.tokens()
            .await
            .filter(|t| !t.is_expired())
            .map(|t| t.access_token)
    }

    pub async fn code_verifier(&self) -> Result<String> {
        match self.store.get(&self.identity, CredentialKind::Verifier).await {
            Some(PersistedCredential::Verifier(verifier)) => Ok(verifier),
            _ => Err(GatewayError::CredentialNotFound("Code verifier")),
        }
    }

    pub async fn save_code_verifier(&self, verifier: &str) -> Result<()> {
        self.put(PersistedCredential::Verifier(verifier.to_string())).await
    }

    async fn put(&self, credential: PersistedCredential) -> Result<()> {
        self.store.put(&self.identity, &credential).await?;
        Ok(())
    }

    /// Accept a resource URL only if it belongs to this upstream
    pub fn validate_resource_url(&self, server_url: &Url, resource: Option<&str>) -> Option<Url> {
        if let Some(allowed) = &self.authorize_resource {
            if resource != Some(allowed.as_str()) {
                error!(
                    "Invalid resource: {:?} is not allowed for this MCP server. Allowed resource: {}",
                    resource, allowed
                );
                return None;
            }
        }

        if server_url.host_str() != self.server_url.host_str()
            || server_url.port_or_known_default() != self.server_url.port_or_known_default()
        {
            error!(
                "Invalid server URL: {} is not allowed for this MCP server. Allowed server URL: {}",
                server_url, self.server_url
            );
            return None;
        }

        let mut url = server_url.clone();
        url.set_fragment(None);
        Some(url)
    }

    /// Resource to request tokens for: the advertised one when it lives on
    /// this upstream's host, else the server URL itself
    fn advertised_resource(&self, advertised: Option<&str>) -> Option<Url> {
        let Some(raw) = advertised else {
            return self.validate_resource_url(&self.server_url, None);
        };
        match Url::parse(raw) {
            Ok(url) => self.validate_resource_url(&url, Some(raw)),
            Err(e) => {
                warn!("Ignoring unparseable resource '{}': {}", raw, e);
                None
            }
        }
    }

    /// Open the authorization page and hold the interactive lock until the
    /// redirect has been handled, whether or not the browser opened.
    pub async fn redirect_to_authorization(&self, url: Url) -> Result<()> {
        let guard = self.lock.acquire().await;
        let result = self.open_and_await(url).await;
        guard.release();
        result
    }

    /// Browser hop and code exchange; the caller holds the interactive lock
    async fn open_and_await(&self, mut url: Url) -> Result<()> {
        if let Some(resource) = &self.authorize_resource {
            set_query_param(&mut url, "resource", resource);
        }

        info!("Open the authorization URL, and proceed with the authentication process.");
        match sanitize_url(&url) {
            Ok(safe) => {
                info!("URL: {}", safe);
                if let Err(e) = self.browser.open(&safe).await {
                    warn!("Failed to open browser: {:#}", e);
                }
            }
            Err(e) => warn!("Not opening authorization URL: {:#}", e),
        }

        self.await_authorization().await
    }

    async fn await_authorization(&self) -> Result<()> {
        let callback = self.callback.as_ref().ok_or_else(|| {
            GatewayError::CallbackError("no callback listener for this upstream".to_string())
        })?;
        let code = callback.await_code().await?;
        self.finish_authorization(code).await
    }

    /// Exchange a received code for tokens and persist them
    pub async fn finish_authorization(&self, code: AuthorizationCode) -> Result<()> {
        if let Some(state) = &code.state {
            if state != &self.state {
                return Err(GatewayError::CallbackError(
                    "state parameter does not match this authorization request".to_string(),
                ));
            }
        }

        let context = self.context().await?;
        let client = self.client_information().await.ok_or_else(|| {
            GatewayError::OAuth("no registered client for the current redirect URI".to_string())
        })?;
        let verifier = self.code_verifier().await?;

        let flow = OAuthFlow::new(context.server.metadata.clone(), &client);
        let tokens = flow
            .exchange_code(
                &self.http_client,
                &code.code,
                &self.redirect_url(),
                &verifier,
                context.resource.as_ref().map(Url::as_str),
            )
            .await
            .map_err(GatewayError::oauth)?;

        self.save_tokens(&tokens).await?;
        info!(identity = %self.identity, "OAuth authorization complete");
        Ok(())
    }

    /// Obtain fresh tokens: refresh if possible, else run the interactive flow
    pub async fn authorize(&self) -> Result<AuthOutcome> {
        let context = self.context().await?;

        if let Some(tokens) = self.try_refresh(&context).await {
            self.save_tokens(&tokens).await?;
            return Ok(AuthOutcome::Refreshed);
        }

        let callback = self.callback.as_ref().ok_or_else(|| {
            GatewayError::CallbackError("no callback listener for this upstream".to_string())
        })?;

        // Bind the listener only while holding the interactive lock
        let guard = self.lock.acquire().await;
        let result = self.interactive_flow(&context, callback.as_ref()).await;
        if result.is_err() {
            callback.cancel().await;
        }
        guard.release();

        result?;
        Ok(AuthOutcome::Interactive)
    }

    async fn interactive_flow(
        &self,
        context: &AuthContext,
        callback: &dyn InteractiveCallback,
    ) -> Result<()> {
        let port = callback.prepare().await?;
        self.callback_port.store(port, Ordering::SeqCst);

        let client = match self.client_information().await {
            Some(client) => client,
            None => self.register(context).await?,
        };

        let pkce = PkceChallenge::generate();
        self.save_code_verifier(&pkce.verifier).await?;

        let scope = requested_scope(&context.server);
        let flow = OAuthFlow::new(context.server.metadata.clone(), &client);
        let mut url = flow
            .authorization_url(&self.redirect_url(), &scope, &self.state, &pkce)
            .map_err(GatewayError::oauth)?;
        if let Some(resource) = &context.resource {
            set_query_param(&mut url, "resource", resource.as_str());
        }

        self.open_and_await(url).await
    }

    async fn try_refresh(&self, context: &AuthContext) -> Option<TokenPair> {
        let refresh_token = self.tokens().await?.refresh_token?;
        let client = self.client_information().await?;

        let flow = OAuthFlow::new(context.server.metadata.clone(), &client);
        match flow
            .refresh_token(
                &self.http_client,
                &refresh_token,
                context.resource.as_ref().map(Url::as_str),
            )
            .await
        {
            Ok(tokens) => Some(tokens),
            Err(e) => {
                warn!(identity = %self.identity, "Token refresh failed: {:#}", e);
                self.invalidate_credentials(InvalidationScope::Tokens).await;
                None
            }
        }
    }

    async fn register(&self, context: &AuthContext) -> Result<ClientRegistration> {
        let endpoint = context
            .server
            .metadata
            .registration_endpoint
            .as_deref()
            .ok_or_else(|| {
                GatewayError::OAuth(
                    "authorization server does not support dynamic client registration".to_string(),
                )
            })?;

        let client = register_client(&self.http_client, endpoint, &self.client_metadata())
            .await
            .map_err(GatewayError::oauth)?;
        self.save_client_information(&client).await?;
        Ok(client)
    }

    /// Discovery result, fetched once per provider
    async fn context(&self) -> Result<AuthContext> {
        if let Some(context) = self.context.lock().clone() {
            return Ok(context);
        }

        let server = OAuthDiscovery::new(self.http_client.clone())
            .discover(&self.server_url)
            .await
            .map_err(GatewayError::oauth)?;
        let advertised = server
            .resource_metadata
            .as_ref()
            .and_then(|m| m.resource.as_deref());
        let resource = self.advertised_resource(advertised);

        let context = AuthContext { server, resource };
        *self.context.lock() = Some(context.clone());
        Ok(context)
    }

    /// Delete the selected artifacts; each deletion runs independently and
    /// failures are only logged
    pub async fn invalidate_credentials(&self, scope: InvalidationScope) {
        let delete = |kind: CredentialKind| async move {
            if !scope.includes(kind) {
                return;
            }
            if let Err(e) = self.store.delete(&self.identity, kind).await {
                warn!(identity = %self.identity, kind = kind.as_str(), "Failed to delete credential: {:#}", e);
            }
        };

        tokio::join!(
            delete(CredentialKind::Client),
            delete(CredentialKind::Tokens),
            delete(CredentialKind::Verifier),
        );
    }
}

fn requested_scope(server: &DiscoveredServer) -> String {
    match &server.resource_metadata {
        Some(resource) if !resource.scopes_supported.is_empty() => resource.scopes_supported.join(" "),
        _ => server.metadata.requested_scope(),
    }
}

/// Replace (or add) a single query parameter
fn set_query_param(url: &mut Url, key: &str, value: &str) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut query = url.query_pairs_mut();
    query.clear();
    for (k, v) in &kept {
        query.append_pair(k, v);
    }
    query.append_pair(key, value);
}
