//! OAuth server discovery
//!
//! 1. Protected resource metadata (RFC 9728) names the authorization server
//!    and the canonical `resource` of the MCP endpoint.
//! 2. Authorization server metadata (RFC 8414, then OpenID Connect discovery).
//! 3. Without metadata, default endpoints on the authorization server origin.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

/// Authorization server metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthMetadata {
    #[serde(default)]
    pub issuer: Option<String>,

    pub authorization_endpoint: String,

    pub token_endpoint: String,

    #[serde(default)]
    pub registration_endpoint: Option<String>,

    #[serde(default)]
    pub response_types_supported: Vec<String>,

    #[serde(default)]
    pub grant_types_supported: Vec<String>,

    #[serde(default)]
    pub scopes_supported: Vec<String>,

    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
}

impl OAuthMetadata {
    /// Endpoints assumed when the server publishes no metadata
    pub fn fallback(authorization_server: &Url) -> anyhow::Result<Self> {
        Ok(Self {
            issuer: None,
            authorization_endpoint: authorization_server.join("/authorize")?.to_string(),
            token_endpoint: authorization_server.join("/token")?.to_string(),
            registration_endpoint: Some(authorization_server.join("/register")?.to_string()),
            response_types_supported: vec!["code".to_string()],
            grant_types_supported: vec![],
            scopes_supported: vec![],
            code_challenge_methods_supported: vec!["S256".to_string()],
        })
    }

    /// Scope string to request, empty when the server advertises none
    pub fn requested_scope(&self) -> String {
        self.scopes_supported.join(" ")
    }
}

/// Protected resource metadata served by the MCP endpoint's origin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub authorization_servers: Vec<String>,
    #[serde(default)]
    pub scopes_supported: Vec<String>,
}

/// Everything needed to run a flow against one upstream
#[derive(Debug, Clone)]
pub struct DiscoveredServer {
    pub authorization_server: Url,
    pub metadata: OAuthMetadata,
    pub resource_metadata: Option<ProtectedResourceMetadata>,
}

/// OAuth Discovery client
pub struct OAuthDiscovery {
    http_client: reqwest::Client,
}

impl OAuthDiscovery {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Discover endpoints for the MCP server at `server_url`
    pub async fn discover(&self, server_url: &Url) -> anyhow::Result<DiscoveredServer> {
        let resource_metadata = self.fetch_resource_metadata(server_url).await;

        let authorization_server = match resource_metadata
            .as_ref()
            .and_then(|m| m.authorization_servers.first())
        {
            Some(issuer) => Url::parse(issuer)?,
            None => origin(server_url)?,
        };

        let metadata = match self.fetch_authorization_server_metadata(&authorization_server).await {
            Some(metadata) => metadata,
            None => {
                info!(
                    server = %authorization_server,
                    "No authorization server metadata, using default endpoints"
                );
                OAuthMetadata::fallback(&authorization_server)?
            }
        };

        Ok(DiscoveredServer {
            authorization_server,
            metadata,
            resource_metadata,
        })
    }

    async fn fetch_resource_metadata(&self, server_url: &Url) -> Option<ProtectedResourceMetadata> {
        for url in well_known_urls(server_url, "oauth-protected-resource") {
            match self.fetch_json::<ProtectedResourceMetadata>(&url).await {
                Ok(metadata) => {
                    debug!("Protected resource metadata found at {}", url);
                    return Some(metadata);
                }
                Err(e) => debug!("Protected resource metadata not at {}: {}", url, e),
            }
        }
        None
    }

    async fn fetch_authorization_server_metadata(&self, issuer: &Url) -> Option<OAuthMetadata> {
        let candidates = well_known_urls(issuer, "oauth-authorization-server")
            .into_iter()
            .chain(well_known_urls(issuer, "openid-configuration"));

        for url in candidates {
            match self.fetch_json::<OAuthMetadata>(&url).await {
                Ok(metadata) => {
                    info!("OAuth discovery successful via {}", url);
                    return Some(metadata);
                }
                Err(e) => debug!("OAuth discovery failed at {}: {}", url, e),
            }
        }
        None
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> anyhow::Result<T> {
        let response = self
            .http_client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("Discovery request failed: HTTP {}", response.status());
        }

        Ok(response.json().await?)
    }
}

/// Path-aware well-known URL first, then the root one
fn well_known_urls(base: &Url, suffix: &str) -> Vec<String> {
    let root = format!(
        "{}/.well-known/{}",
        base.origin().ascii_serialization(),
        suffix
    );
    let path = base.path().trim_end_matches('/');
    if path.is_empty() {
        vec![root]
    } else {
        vec![format!("{}{}", root, path), root]
    }
}

fn origin(url: &Url) -> anyhow::Result<Url> {
    Ok(Url::parse(&url.origin().ascii_serialization())?)
}
