//! OAuth artifacts persisted per upstream identity
//!
//! Three credential kinds plus the last callback port are stored per upstream
//! host. Registration and tokens are kept apart so dropping tokens keeps the
//! registered client, and a registration can be re-issued when the redirect
//! URI (which embeds the callback port) changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Credential storage key for one upstream.
///
/// Derived from the URL authority (`host[:port]`), so every URL served by the
/// same host shares one registration, token pair and callback port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpstreamIdentity(String);

impl UpstreamIdentity {
    pub fn from_url(url: &Url) -> Self {
        let host = url.host_str().unwrap_or_default();
        match url.port() {
            Some(port) => Self(format!("{}:{}", host, port)),
            None => Self(host.to_string()),
        }
    }

    pub fn parse(url: &str) -> Result<Self, url::ParseError> {
        Url::parse(url).map(|u| Self::from_url(&u))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UpstreamIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which artifact to read, write or delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// Dynamic client registration response
    Client,
    /// Access / refresh token pair
    Tokens,
    /// PKCE code verifier of the flow in progress
    Verifier,
    /// Last local port used for the redirect URI
    CallbackPort,
}

impl CredentialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKind::Client => "client",
            CredentialKind::Tokens => "tokens",
            CredentialKind::Verifier => "verifier",
            CredentialKind::CallbackPort => "callback_port",
        }
    }
}

/// Client metadata sent to a registration endpoint (RFC 7591)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
    pub redirect_uris: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub response_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_method: Option<String>,
}

/// Registered client as returned by the authorization server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRegistration {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id_issued_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_expires_at: Option<i64>,
    #[serde(flatten)]
    pub metadata: ClientMetadata,
}

impl ClientRegistration {
    /// First registered redirect URI; reuse is only valid while it matches
    pub fn redirect_uri(&self) -> Option<&str> {
        self.metadata.redirect_uris.first().map(String::as_str)
    }

    pub fn matches_redirect_uri(&self, redirect_uri: &str) -> bool {
        self.redirect_uri() == Some(redirect_uri)
    }
}

/// Issued OAuth token pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenPair {
    /// Tokens without an expiry are treated as valid
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|exp| exp <= Utc::now()).unwrap_or(false)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}

/// Tagged union of everything the credential store holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistedCredential {
    Client(ClientRegistration),
    Tokens(TokenPair),
    Verifier(String),
    CallbackPort(u16),
}

impl PersistedCredential {
    pub fn kind(&self) -> CredentialKind {
        match self {
            PersistedCredential::Client(_) => CredentialKind::Client,
            PersistedCredential::Tokens(_) => CredentialKind::Tokens,
            PersistedCredential::Verifier(_) => CredentialKind::Verifier,
            PersistedCredential::CallbackPort(_) => CredentialKind::CallbackPort,
        }
    }
}
