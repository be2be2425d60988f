//! Settings shared by the streamable HTTP and SSE transports

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use modular_mcp_core::TransportKind;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use tracing::{debug, error, info};
use url::Url;

use super::TransportConnectResult;
use crate::auth::AuthorizationProvider;
use crate::error::GatewayError;

const AUTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

pub struct RemoteEndpoint {
    pub group: String,
    pub kind: TransportKind,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
    pub access_token: Option<String>,
    pub provider: Arc<AuthorizationProvider>,
    pub connect_timeout: Duration,
}

impl RemoteEndpoint {
    /// Configured headers plus the stored bearer token, unless the config
    /// already sets its own `Authorization`
    pub fn default_headers(&self) -> Result<HeaderMap, String> {
        let mut header_map = HeaderMap::new();
        for (key, value) in &self.headers {
            let header_name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| format!("Invalid header name '{}': {}", key, e))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| format!("Invalid header value for '{}': {}", key, e))?;
            header_map.insert(header_name, header_value);
        }

        if let Some(token) = &self.access_token {
            if !header_map.contains_key(AUTHORIZATION) {
                let value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| format!("Invalid access token: {}", e))?;
                header_map.insert(AUTHORIZATION, value);
            }
        }
        debug!(
            group = %self.group,
            header_count = header_map.len(),
            authenticated = self.access_token.is_some(),
            "Prepared request headers"
        );
        Ok(header_map)
    }

    /// Client carrying [`Self::default_headers`]; no overall request
    /// timeout so long-lived event streams stay open
    pub fn http_client(&self) -> Result<reqwest::Client, TransportConnectResult> {
        let header_map = self.default_headers().map_err(|err| {
            error!(group = %self.group, "{}", err);
            TransportConnectResult::Failed(GatewayError::ConfigInvalid(err))
        })?;
        reqwest::Client::builder()
            .default_headers(header_map)
            .build()
            .map_err(|e| self.failed(format!("Failed to build HTTP client: {}", e)))
    }

    /// Ask the endpoint directly whether it rejects our credentials.
    ///
    /// Used when the handshake error itself does not say why it failed.
    /// Only an HTTP 401 counts; an unreachable server never does.
    pub async fn rejects_credentials(&self, client: &reqwest::Client) -> bool {
        let response = client
            .get(self.url.as_str())
            .timeout(AUTH_CHECK_TIMEOUT)
            .header(ACCEPT, "application/json, text/event-stream")
            .send()
            .await;
        match response {
            Ok(response) => response.status() == StatusCode::UNAUTHORIZED,
            Err(e) => {
                debug!(group = %self.group, "Credential check request failed: {}", e);
                false
            }
        }
    }

    pub fn oauth_required(&self) -> TransportConnectResult {
        info!(group = %self.group, "Server requires OAuth authentication");
        TransportConnectResult::OAuthRequired {
            server_url: self.url.to_string(),
        }
    }

    pub fn failed(&self, err: String) -> TransportConnectResult {
        error!(group = %self.group, "{}", err);
        TransportConnectResult::Failed(GatewayError::TransportUnavailable(err))
    }

    pub fn description(&self) -> String {
        format!("{}:{}", self.kind, self.url)
    }
}
