//! Legacy HTTP+SSE transport
//!
//! The client opens a long-lived `GET` event stream. The server's first
//! `endpoint` event names the URL that JSON-RPC messages are `POST`ed to;
//! responses and notifications arrive as `message` events on the stream.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use modular_mcp_core::TransportKind;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use rmcp::model::{ClientJsonRpcMessage, ServerJsonRpcMessage};
use rmcp::service::ClientInitializeError;
use rmcp::transport::worker::{Worker, WorkerContext, WorkerQuitReason, WorkerSendRequest};
use rmcp::{RoleClient, ServiceExt};
use sse_stream::{Sse, SseStream};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::remote::RemoteEndpoint;
use super::{Transport, TransportConnectResult};
use crate::auth::AuthOutcome;
use crate::error::Result;
use crate::pool::instance::{McpClient, McpClientHandler};

const ENDPOINT_EVENT: &str = "endpoint";
const MESSAGE_EVENT: &str = "message";

#[derive(Debug, Error)]
pub enum SseTransportError {
    #[error("event stream error: {0}")]
    Stream(#[from] sse_stream::Error),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded with HTTP {0}")]
    Status(StatusCode),
    #[error("event stream ended before the endpoint event")]
    MissingEndpoint,
    #[error("invalid message endpoint '{0}'")]
    InvalidEndpoint(String),
    #[error("event stream closed by server")]
    StreamEnded,
    #[error("transport closed")]
    Closed,
    #[error("transport task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl SseTransportError {
    fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status(StatusCode::UNAUTHORIZED))
    }
}

/// Resolve the `endpoint` event payload against the stream URL.
///
/// Messages may only be posted back to the origin that served the stream.
fn resolve_endpoint(stream_url: &Url, data: &str) -> std::result::Result<Url, SseTransportError> {
    let endpoint = stream_url
        .join(data.trim())
        .map_err(|_| SseTransportError::InvalidEndpoint(data.to_string()))?;
    if endpoint.origin() != stream_url.origin() {
        return Err(SseTransportError::InvalidEndpoint(data.to_string()));
    }
    Ok(endpoint)
}

/// Client side of one open event stream
struct LegacySseWorker {
    client: reqwest::Client,
    message_url: Url,
    events: BoxStream<'static, std::result::Result<Sse, sse_stream::Error>>,
}

impl LegacySseWorker {
    /// Open the event stream and wait for the message endpoint
    async fn open(
        client: reqwest::Client,
        stream_url: &Url,
    ) -> std::result::Result<Self, SseTransportError> {
        let response = client
            .get(stream_url.as_str())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SseTransportError::Status(status));
        }

        let mut events = SseStream::from_bytes_stream(response.bytes_stream()).boxed();
        while let Some(event) = events.next().await {
            let event = event?;
            if event.event.as_deref() != Some(ENDPOINT_EVENT) {
                continue;
            }
            let data = event.data.unwrap_or_default();
            let message_url = resolve_endpoint(stream_url, &data)?;
            debug!(%message_url, "Received message endpoint");
            return Ok(Self {
                client,
                message_url,
                events,
            });
        }
        Err(SseTransportError::MissingEndpoint)
    }
}

async fn post_message(
    client: &reqwest::Client,
    message_url: &Url,
    message: &ClientJsonRpcMessage,
) -> std::result::Result<(), SseTransportError> {
    let response = client.post(message_url.as_str()).json(message).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SseTransportError::Status(status));
    }
    Ok(())
}

impl Worker for LegacySseWorker {
    type Error = SseTransportError;
    type Role = RoleClient;

    fn err_closed() -> Self::Error {
        SseTransportError::Closed
    }

    fn err_join(e: tokio::task::JoinError) -> Self::Error {
        SseTransportError::Join(e)
    }

    async fn run(
        self,
        context: WorkerContext<Self>,
    ) -> std::result::Result<(), WorkerQuitReason<Self::Error>> {
        let Self {
            client,
            message_url,
            mut events,
        } = self;
        let WorkerContext {
            to_handler_tx,
            mut from_handler_rx,
            cancellation_token,
        } = context;

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    return Err(WorkerQuitReason::Cancelled);
                }
                request = from_handler_rx.recv() => {
                    let Some(WorkerSendRequest { message, responder }) = request else {
                        return Err(WorkerQuitReason::HandlerTerminated);
                    };
                    // Posts stay in order so `initialized` lands before the first request
                    let result = post_message(&client, &message_url, &message).await;
                    let _ = responder.send(result);
                }
                event = events.next() => {
                    let event = match event {
                        Some(Ok(event)) => event,
                        Some(Err(e)) => {
                            return Err(WorkerQuitReason::fatal(
                                SseTransportError::Stream(e),
                                "read event stream",
                            ));
                        }
                        None => {
                            return Err(WorkerQuitReason::fatal(
                                SseTransportError::StreamEnded,
                                "read event stream",
                            ));
                        }
                    };
                    if !matches!(event.event.as_deref(), None | Some(MESSAGE_EVENT)) {
                        continue;
                    }
                    let Some(data) = event.data else { continue };
                    let message = match serde_json::from_str::<ServerJsonRpcMessage>(&data) {
                        Ok(message) => message,
                        Err(e) => {
                            warn!("Dropping malformed SSE message: {}", e);
                            continue;
                        }
                    };
                    if to_handler_tx.send(message).await.is_err() {
                        return Err(WorkerQuitReason::HandlerTerminated);
                    }
                }
            }
        }
    }
}

fn is_unauthorized_handshake(error: &ClientInitializeError) -> bool {
    match error {
        ClientInitializeError::TransportError { error, .. } => error
            .error
            .downcast_ref::<SseTransportError>()
            .is_some_and(SseTransportError::is_unauthorized),
        _ => false,
    }
}

pub struct SseTransport {
    endpoint: RemoteEndpoint,
}

impl SseTransport {
    pub fn new(endpoint: RemoteEndpoint) -> Self {
        Self { endpoint }
    }

    async fn try_connect(&self, client: reqwest::Client) -> std::result::Result<McpClient, TransportConnectResult> {
        let endpoint = &self.endpoint;
        let worker = LegacySseWorker::open(client, &endpoint.url)
            .await
            .map_err(|e| {
                if e.is_unauthorized() {
                    endpoint.oauth_required()
                } else {
                    endpoint.failed(format!("SSE connection failed: {}", e))
                }
            })?;
        McpClientHandler::new(&endpoint.group)
            .serve(worker)
            .await
            .map_err(|e| {
                if is_unauthorized_handshake(&e) {
                    endpoint.oauth_required()
                } else {
                    endpoint.failed(format!("SSE handshake failed: {:#}", e))
                }
            })
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn connect(&self) -> TransportConnectResult {
        let endpoint = &self.endpoint;
        info!(
            group = %endpoint.group,
            url = %endpoint.url,
            transport = %endpoint.kind,
            "Connecting to SSE server"
        );

        let client = match endpoint.http_client() {
            Ok(client) => client,
            Err(result) => return result,
        };

        match tokio::time::timeout(endpoint.connect_timeout, self.try_connect(client)).await {
            Ok(Ok(service)) => {
                info!(group = %endpoint.group, "SSE server connected");
                TransportConnectResult::Connected(service)
            }
            Ok(Err(result)) => result,
            Err(_) => endpoint.failed(format!("Connection timeout ({:?})", endpoint.connect_timeout)),
        }
    }

    async fn authorize(&self) -> Result<AuthOutcome> {
        self.endpoint.provider.authorize().await
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Sse
    }

    fn description(&self) -> String {
        self.endpoint.description()
    }
}
