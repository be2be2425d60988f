//! Opening authorization URLs in the user's browser

use async_trait::async_trait;
use url::Url;

/// Opens a URL for the user to interact with
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn open(&self, url: &str) -> anyhow::Result<()>;
}

/// Default system browser via the platform opener
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

#[async_trait]
impl BrowserLauncher for SystemBrowser {
    async fn open(&self, url: &str) -> anyhow::Result<()> {
        let url = url.to_string();
        tokio::task::spawn_blocking(move || open::that(url)).await??;
        Ok(())
    }
}

/// Only absolute http(s) URLs with a host are handed to the opener
pub fn sanitize_url(url: &Url) -> anyhow::Result<String> {
    match url.scheme() {
        "http" | "https" => {}
        other => anyhow::bail!("refusing to open URL with scheme '{}'", other),
    }
    if url.host_str().map_or(true, str::is_empty) {
        anyhow::bail!("refusing to open URL without a host");
    }
    if !url.username().is_empty() || url.password().is_some() {
        anyhow::bail!("refusing to open URL with embedded credentials");
    }
    Ok(url.as_str().to_string())
}
