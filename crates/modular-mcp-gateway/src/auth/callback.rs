//! Local OAuth redirect listener
//!
//! Binds `127.0.0.1` on the preferred port (or an ephemeral one), serves a
//! single `/oauth/callback` route and hands the first authorization code to
//! [`CallbackListener::await_code`]. The listener stops after the code is
//! consumed, on timeout, on SIGINT/SIGTERM or when dropped, whichever comes
//! first; later triggers are no-ops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use modular_mcp_core::branding;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, Result};
use crate::signal::shutdown_signal;

/// Default time to wait for the user to finish authorizing (5 minutes)
pub const DEFAULT_OAUTH_TIMEOUT: Duration = Duration::from_secs(300);

/// Upper bound on waiting for open connections after teardown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct CallbackOptions {
    /// Port to try first; any free port is used if it is taken
    pub preferred_port: Option<u16>,
    /// Counted from the call to `await_code`, not from `start`
    pub timeout: Duration,
}

impl Default for CallbackOptions {
    fn default() -> Self {
        Self {
            preferred_port: None,
            timeout: DEFAULT_OAUTH_TIMEOUT,
        }
    }
}

/// Code and state carried by the redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub code: String,
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

type CallbackResult = Result<AuthorizationCode>;

/// Single-assignment cell: the first resolution wins, later ones are dropped
struct PendingAuthorization {
    sender: Mutex<Option<oneshot::Sender<CallbackResult>>>,
    receiver: Mutex<Option<oneshot::Receiver<CallbackResult>>>,
}

impl PendingAuthorization {
    fn new() -> Arc<Self> {
        let (tx, rx) = oneshot::channel();
        Arc::new(Self {
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
        })
    }

    fn resolve(&self, result: CallbackResult) -> bool {
        match self.sender.lock().take() {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }

    fn take_receiver(&self) -> Option<oneshot::Receiver<CallbackResult>> {
        self.receiver.lock().take()
    }
}

struct ListenerState {
    pending: Mutex<Arc<PendingAuthorization>>,
}

impl ListenerState {
    fn current(&self) -> Arc<PendingAuthorization> {
        self.pending.lock().clone()
    }

    /// Swap in a fresh cell; the old one is never reset in place
    fn renew(&self) {
        *self.pending.lock() = PendingAuthorization::new();
    }
}

pub struct CallbackListener {
    port: u16,
    timeout: Duration,
    state: Arc<ListenerState>,
    shutdown_tx: watch::Sender<bool>,
    torn_down: Arc<AtomicBool>,
    server: Mutex<Option<JoinHandle<()>>>,
}

impl CallbackListener {
    /// Bind and start serving the callback route
    pub async fn start(options: CallbackOptions) -> Result<Self> {
        let (listener, port_source) = try_bind_with_fallback(options.preferred_port).await?;
        let port = listener.local_addr()?.port();

        let state = Arc::new(ListenerState {
            pending: Mutex::new(PendingAuthorization::new()),
        });
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let torn_down = Arc::new(AtomicBool::new(false));

        let app = Router::new()
            .route(branding::OAUTH_CALLBACK_PATH, get(handle_callback))
            .with_state(state.clone());

        let server = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });
            if let Err(e) = server.await {
                warn!("OAuth callback listener error: {}", e);
            }
        });

        // Safety net so a killed process never leaves the port bound
        let signal_tx = shutdown_tx.clone();
        let signal_flag = torn_down.clone();
        let mut stopped_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_signal() => {
                    if !signal_flag.swap(true, Ordering::SeqCst) {
                        info!(port, "Signal received, stopping OAuth callback listener");
                        let _ = signal_tx.send(true);
                    }
                }
                _ = stopped_rx.changed() => {}
            }
        });

        info!(
            "OAuth callback listener on 127.0.0.1:{} ({})",
            port, port_source
        );

        Ok(Self {
            port,
            timeout: options.timeout,
            state,
            shutdown_tx,
            torn_down,
            server: Mutex::new(Some(server)),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn redirect_uri(&self) -> String {
        branding::oauth_callback_uri_with_port(self.port)
    }

    /// Wait for the redirect, bounded by the configured timeout.
    ///
    /// The listener is torn down once this returns, whatever the outcome.
    pub async fn await_code(&self) -> Result<AuthorizationCode> {
        let pending = self.state.current();
        let Some(receiver) = pending.take_receiver() else {
            return Err(GatewayError::CallbackError(
                "authorization code already awaited".to_string(),
            ));
        };

        let outcome = tokio::time::timeout(self.timeout, receiver).await;
        self.state.renew();
        self.teardown();
        self.wait_stopped().await;

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(GatewayError::CallbackError(
                "callback listener closed before a code arrived".to_string(),
            )),
            Err(_) => {
                warn!(port = self.port, "Timed out waiting for OAuth callback");
                Err(GatewayError::AuthorizationTimeout(self.timeout))
            }
        }
    }

    /// Stop serving; safe to call any number of times
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(true);
        debug!(port = self.port, "OAuth callback listener stopped");
    }

    /// Wait for the server task so the port is free for the next bind
    pub async fn wait_stopped(&self) {
        let Some(server) = self.server.lock().take() else {
            return;
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, server).await.is_err() {
            debug!(port = self.port, "Callback listener still draining connections");
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn try_bind_with_fallback(preferred_port: Option<u16>) -> Result<(TcpListener, &'static str)> {
    if let Some(port) = preferred_port {
        match TcpListener::bind(("127.0.0.1", port)).await {
            Ok(listener) => return Ok((listener, "preferred")),
            Err(e) => info!(
                "Preferred callback port {} unavailable ({}), allocating dynamic port",
                port, e
            ),
        }
    }
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.map_err(|e| {
        GatewayError::TransportUnavailable(format!("failed to bind OAuth callback listener: {}", e))
    })?;
    Ok((listener, "dynamic"))
}

async fn handle_callback(
    State(state): State<Arc<ListenerState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let pending = state.current();

    if let Some(error) = params.error {
        let message = match params.error_description {
            Some(description) => format!("{}: {}", error, description),
            None => error,
        };
        warn!("Authorization server returned an error: {}", message);
        pending.resolve(Err(GatewayError::AuthorizationDenied(message.clone())));
        return (
            StatusCode::BAD_REQUEST,
            Html(page("Authorization failed", &message)),
        )
            .into_response();
    }

    let Some(code) = params.code else {
        return (
            StatusCode::BAD_REQUEST,
            Html(page("Authorization failed", "No authorization code received")),
        )
            .into_response();
    };

    if pending.resolve(Ok(AuthorizationCode {
        code,
        state: params.state,
    })) {
        info!("Authorization code received");
    } else {
        debug!("Ignoring repeated OAuth callback");
    }

    Html(page(
        "Authorization successful",
        "You can close this window and return to your MCP client.",
    ))
    .into_response()
}

fn page(title: &str, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{app} - {title}</title></head>
<body style="font-family: system-ui, sans-serif; text-align: center; padding: 48px;">
<h1>{title}</h1>
<p>{message}</p>
</body>
</html>"#,
        app = branding::DISPLAY_NAME,
        title = title,
        message = escape_html(message),
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
