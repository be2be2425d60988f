//! Streamable HTTP transport for remote MCP servers
//!
//! Configured headers are sent on every request. When the store holds a
//! usable access token it rides along as a bearer header; a 401 from the
//! server is reported as [`TransportConnectResult::OAuthRequired`] so the
//! session manager can authorize and rebuild the transport.

use async_trait::async_trait;
use modular_mcp_core::TransportKind;
use reqwest::StatusCode;
use rmcp::service::ClientInitializeError;
use rmcp::transport::streamable_http_client::{
    StreamableHttpClientTransportConfig, StreamableHttpError,
};
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::ServiceExt;
use tracing::info;

use super::remote::RemoteEndpoint;
use super::{Transport, TransportConnectResult};
use crate::auth::AuthOutcome;
use crate::error::Result;
use crate::pool::instance::McpClientHandler;

pub struct HttpTransport {
    endpoint: RemoteEndpoint,
}

impl HttpTransport {
    pub fn new(endpoint: RemoteEndpoint) -> Self {
        Self { endpoint }
    }
}

/// Whether the handshake failed because the server wants credentials
fn is_auth_required(error: &ClientInitializeError) -> bool {
    let ClientInitializeError::TransportError { error, .. } = error else {
        return false;
    };
    match error
        .error
        .downcast_ref::<StreamableHttpError<reqwest::Error>>()
    {
        Some(StreamableHttpError::AuthRequired(_)) => true,
        Some(StreamableHttpError::Client(e)) => e.status() == Some(StatusCode::UNAUTHORIZED),
        _ => false,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&self) -> TransportConnectResult {
        let endpoint = &self.endpoint;
        info!(
            group = %endpoint.group,
            url = %endpoint.url,
            transport = %endpoint.kind,
            "Connecting to HTTP server"
        );

        let client = match endpoint.http_client() {
            Ok(client) => client,
            Err(result) => return result,
        };

        let transport_config = StreamableHttpClientTransportConfig::with_uri(endpoint.url.as_str());
        let transport = StreamableHttpClientTransport::with_client(client.clone(), transport_config);

        let connect_future = McpClientHandler::new(&endpoint.group).serve(transport);
        match tokio::time::timeout(endpoint.connect_timeout, connect_future).await {
            Ok(Ok(service)) => {
                info!(group = %endpoint.group, "HTTP server connected");
                TransportConnectResult::Connected(service)
            }
            Ok(Err(e)) => {
                // A 401 without a WWW-Authenticate header surfaces as an
                // unexpected content type, so fall back to a status check
                if is_auth_required(&e) || endpoint.rejects_credentials(&client).await {
                    endpoint.oauth_required()
                } else {
                    endpoint.failed(format!("HTTP connection failed: {:#}", e))
                }
            }
            Err(_) => endpoint.failed(format!("Connection timeout ({:?})", endpoint.connect_timeout)),
        }
    }

    async fn authorize(&self) -> Result<AuthOutcome> {
        self.endpoint.provider.authorize().await
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    fn description(&self) -> String {
        self.endpoint.description()
    }
}
