use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use modular_mcp_gateway::BrowserLauncher;
use parking_lot::Mutex;
use url::Url;

/// Follows the authorization URL straight to its redirect URI with a code,
/// the way an already-consented user would
#[derive(Clone, Default)]
pub struct RedirectingBrowser {
    opened: Arc<Mutex<Vec<String>>>,
}

impl RedirectingBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl BrowserLauncher for RedirectingBrowser {
    async fn open(&self, url: &str) -> anyhow::Result<()> {
        self.opened.lock().push(url.to_string());

        let authorize = Url::parse(url)?;
        let param = |name: &str| {
            authorize
                .query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
        };
        let redirect_uri = param("redirect_uri").ok_or_else(|| anyhow::anyhow!("no redirect_uri"))?;

        let mut callback = Url::parse(&redirect_uri)?;
        {
            let mut query = callback.query_pairs_mut();
            query.append_pair("code", "test-authorization-code");
            if let Some(state) = param("state") {
                query.append_pair("state", &state);
            }
        }
        reqwest::get(callback).await?.error_for_status()?;
        Ok(())
    }
}

/// When one browser window was opened and when its redirect came back
#[derive(Debug, Clone, Copy)]
pub struct BrowserWindow {
    pub opened: Instant,
    pub completed: Instant,
}

/// Lingers on the consent page for `dwell` before redirecting, recording
/// each window's open and completion times
#[derive(Clone)]
pub struct TimedBrowser {
    inner: RedirectingBrowser,
    dwell: Duration,
    windows: Arc<Mutex<Vec<BrowserWindow>>>,
}

impl TimedBrowser {
    pub fn new(dwell: Duration) -> Self {
        Self {
            inner: RedirectingBrowser::new(),
            dwell,
            windows: Arc::default(),
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.inner.opened()
    }

    pub fn windows(&self) -> Vec<BrowserWindow> {
        self.windows.lock().clone()
    }
}

#[async_trait]
impl BrowserLauncher for TimedBrowser {
    async fn open(&self, url: &str) -> anyhow::Result<()> {
        let opened = Instant::now();
        tokio::time::sleep(self.dwell).await;
        self.inner.open(url).await?;
        self.windows.lock().push(BrowserWindow {
            opened,
            completed: Instant::now(),
        });
        Ok(())
    }
}

/// Records the URL and never completes the redirect
#[derive(Clone, Default)]
pub struct SilentBrowser {
    opened: Arc<Mutex<Vec<String>>>,
}

impl SilentBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl BrowserLauncher for SilentBrowser {
    async fn open(&self, url: &str) -> anyhow::Result<()> {
        self.opened.lock().push(url.to_string());
        Ok(())
    }
}
