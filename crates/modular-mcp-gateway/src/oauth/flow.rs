//! OAuth Authorization Flow
//!
//! Authorization Code flow with PKCE for one registered client.

use super::{OAuthMetadata, PkceChallenge, TokenResponse};
use modular_mcp_core::{ClientRegistration, TokenPair};
use std::collections::HashMap;
use tracing::{debug, info};
use url::Url;

/// Token endpoint calls for one registered client
pub struct OAuthFlow {
    metadata: OAuthMetadata,
    client_id: String,
    client_secret: Option<String>,
}

impl OAuthFlow {
    pub fn new(metadata: OAuthMetadata, client: &ClientRegistration) -> Self {
        Self {
            metadata,
            client_id: client.client_id.clone(),
            client_secret: client.client_secret.clone(),
        }
    }

    /// Build the URL the user approves in the browser
    pub fn authorization_url(
        &self,
        redirect_uri: &str,
        scope: &str,
        state: &str,
        pkce: &PkceChallenge,
    ) -> anyhow::Result<Url> {
        let mut url = Url::parse(&self.metadata.authorization_endpoint)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", &self.client_id);
            query.append_pair("redirect_uri", redirect_uri);
            if !scope.is_empty() {
                query.append_pair("scope", scope);
            }
            query.append_pair("state", state);
            query.append_pair("code_challenge", &pkce.challenge);
            query.append_pair("code_challenge_method", pkce.method());
        }
        debug!("Created authorization URL: {}", url);
        Ok(url)
    }

    /// Exchange authorization code for tokens
    pub async fn exchange_code(
        &self,
        http_client: &reqwest::Client,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
        resource: Option<&str>,
    ) -> anyhow::Result<TokenPair> {
        info!("Exchanging authorization code for tokens");

        let mut params = self.base_params("authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", redirect_uri);
        params.insert("code_verifier", code_verifier);
        if let Some(resource) = resource {
            params.insert("resource", resource);
        }

        let response = self.post_token(http_client, &params, "Token exchange").await?;
        info!("Token exchange successful");
        Ok(response.into_token_pair(None))
    }

    /// Refresh an access token
    pub async fn refresh_token(
        &self,
        http_client: &reqwest::Client,
        refresh_token: &str,
        resource: Option<&str>,
    ) -> anyhow::Result<TokenPair> {
        info!("Refreshing access token");

        let mut params = self.base_params("refresh_token");
        params.insert("refresh_token", refresh_token);
        if let Some(resource) = resource {
            params.insert("resource", resource);
        }

        let response = self.post_token(http_client, &params, "Token refresh").await?;
        info!("Token refresh successful");
        Ok(response.into_token_pair(Some(refresh_token.to_string())))
    }

    fn base_params<'a>(&'a self, grant_type: &'a str) -> HashMap<&'a str, &'a str> {
        let mut params = HashMap::new();
        params.insert("grant_type", grant_type);
        params.insert("client_id", self.client_id.as_str());
        if let Some(secret) = &self.client_secret {
            params.insert("client_secret", secret.as_str());
        }
        params
    }

    async fn post_token(
        &self,
        http_client: &reqwest::Client,
        params: &HashMap<&str, &str>,
        what: &str,
    ) -> anyhow::Result<TokenResponse> {
        let response = http_client
            .post(&self.metadata.token_endpoint)
            .header("Accept", "application/json")
            .form(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{} failed: HTTP {} - {}", what, status, body);
        }

        Ok(response.json().await?)
    }
}
