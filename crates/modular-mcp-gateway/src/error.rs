//! Gateway error taxonomy

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Subprocess spawn, socket or handshake failure
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Upstream rejected the connection for lack of valid credentials
    #[error("Unauthorized")]
    Unauthorized,

    #[error("OAuth authorization timed out after {}ms without a callback", .0.as_millis())]
    AuthorizationTimeout(Duration),

    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    /// Malformed redirect (missing code, state mismatch, listener gone)
    #[error("invalid authorization callback: {0}")]
    CallbackError(String),

    #[error("{0} not found")]
    CredentialNotFound(&'static str),

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("Not connected to group: {0}")]
    GroupNotConnected(String),

    #[error("Group {group} failed to connect: {cause}")]
    GroupFailed { group: String, cause: String },

    #[error("upstream request failed: {0}")]
    Service(#[from] rmcp::ServiceError),

    #[error("credential storage error: {0:#}")]
    Storage(#[from] anyhow::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    pub fn oauth(err: anyhow::Error) -> Self {
        GatewayError::OAuth(format!("{:#}", err))
    }

    /// Whether this failure should trigger the interactive authorization retry
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, GatewayError::Unauthorized)
    }
}
