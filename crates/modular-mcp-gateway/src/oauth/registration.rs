//! Dynamic Client Registration (RFC 7591), client side

use modular_mcp_core::{ClientMetadata, ClientRegistration};
use serde::Deserialize;
use tracing::info;

/// Registration endpoint response; most servers echo the request metadata
#[derive(Debug, Deserialize)]
struct RegistrationResponse {
    client_id: String,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    client_id_issued_at: Option<i64>,
    #[serde(default)]
    client_secret_expires_at: Option<i64>,
    #[serde(default)]
    redirect_uris: Option<Vec<String>>,
    #[serde(default)]
    token_endpoint_auth_method: Option<String>,
}

/// Register `metadata` at `registration_endpoint`
pub async fn register_client(
    http_client: &reqwest::Client,
    registration_endpoint: &str,
    metadata: &ClientMetadata,
) -> anyhow::Result<ClientRegistration> {
    let response = http_client
        .post(registration_endpoint)
        .json(metadata)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Client registration failed: HTTP {} - {}", status, body);
    }

    let registered: RegistrationResponse = response.json().await?;
    info!(client_id = %registered.client_id, "Registered OAuth client");

    let mut stored = metadata.clone();
    if let Some(redirect_uris) = registered.redirect_uris {
        stored.redirect_uris = redirect_uris;
    }
    if registered.token_endpoint_auth_method.is_some() {
        stored.token_endpoint_auth_method = registered.token_endpoint_auth_method;
    }

    Ok(ClientRegistration {
        client_id: registered.client_id,
        client_secret: registered.client_secret,
        client_id_issued_at: registered.client_id_issued_at,
        client_secret_expires_at: registered.client_secret_expires_at,
        metadata: stored,
    })
}
