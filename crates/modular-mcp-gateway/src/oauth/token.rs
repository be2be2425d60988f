//! Token endpoint responses

use chrono::{Duration, Utc};
use modular_mcp_core::TokenPair;
use serde::Deserialize;

/// Token response from OAuth server
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Convert to a storable pair. A refresh response that omits the refresh
    /// token keeps `previous_refresh_token`.
    pub fn into_token_pair(self, previous_refresh_token: Option<String>) -> TokenPair {
        TokenPair {
            access_token: self.access_token,
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            refresh_token: self.refresh_token.or(previous_refresh_token),
            expires_at: self
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
            scope: self.scope,
        }
    }
}
