//! Per-upstream callback listener, started on first use
//!
//! The listener prefers the port persisted for the upstream so the redirect
//! URI of an existing client registration stays valid. When that port is
//! taken the new port is persisted and the registration, tokens and verifier
//! tied to the old redirect URI are dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use modular_mcp_core::{CredentialKind, CredentialStore, PersistedCredential, UpstreamIdentity};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::auth::{AuthorizationCode, CallbackListener, CallbackOptions, InteractiveCallback};
use crate::error::Result;

pub struct CallbackSlot {
    identity: UpstreamIdentity,
    persisted_port: parking_lot::Mutex<Option<u16>>,
    default_port: u16,
    timeout: Duration,
    store: Arc<dyn CredentialStore>,
    listener: Mutex<Option<Arc<CallbackListener>>>,
}

impl CallbackSlot {
    pub fn new(
        identity: UpstreamIdentity,
        persisted_port: Option<u16>,
        default_port: u16,
        timeout: Duration,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            identity,
            persisted_port: parking_lot::Mutex::new(persisted_port),
            default_port,
            timeout,
            store,
            listener: Mutex::new(None),
        }
    }

    /// Port the next listener will try first
    pub fn preferred_port(&self) -> u16 {
        self.persisted_port.lock().unwrap_or(self.default_port)
    }

    async fn ensure_listener(&self) -> Result<Arc<CallbackListener>> {
        let mut slot = self.listener.lock().await;
        if let Some(listener) = slot.as_ref().filter(|l| !l.is_torn_down()) {
            return Ok(listener.clone());
        }

        let listener = Arc::new(
            CallbackListener::start(CallbackOptions {
                preferred_port: Some(self.preferred_port()),
                timeout: self.timeout,
            })
            .await?,
        );
        self.record_port(listener.port()).await;

        *slot = Some(listener.clone());
        Ok(listener)
    }

    async fn record_port(&self, port: u16) {
        let previous = *self.persisted_port.lock();
        if previous == Some(port) {
            return;
        }

        if let Err(e) = self
            .store
            .put(&self.identity, &PersistedCredential::CallbackPort(port))
            .await
        {
            warn!(identity = %self.identity, "Failed to persist callback port: {:#}", e);
        }
        *self.persisted_port.lock() = Some(port);

        if let Some(previous) = previous {
            info!(
                identity = %self.identity,
                previous,
                port,
                "Callback port changed, dropping credentials bound to the old redirect URI"
            );
            let (client, tokens, verifier) = tokio::join!(
                self.store.delete(&self.identity, CredentialKind::Client),
                self.store.delete(&self.identity, CredentialKind::Tokens),
                self.store.delete(&self.identity, CredentialKind::Verifier),
            );
            for result in [client, tokens, verifier] {
                if let Err(e) = result {
                    warn!(identity = %self.identity, "Failed to invalidate credential: {:#}", e);
                }
            }
        }
    }
}

#[async_trait]
impl InteractiveCallback for CallbackSlot {
    async fn prepare(&self) -> Result<u16> {
        Ok(self.ensure_listener().await?.port())
    }

    async fn await_code(&self) -> Result<AuthorizationCode> {
        let listener = self.ensure_listener().await?;
        let result = listener.await_code().await;
        self.listener.lock().await.take();
        result
    }

    async fn cancel(&self) {
        let listener = self.listener.lock().await.take();
        if let Some(listener) = listener {
            listener.teardown();
            listener.wait_stopped().await;
        }
    }
}
