//! modular-mcp
//!
//! Serves two MCP tools over stdio and proxies them to the upstream servers
//! named in the config file.

mod cli;
mod logging;
mod migrate;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use modular_mcp_core::{branding, load_config};
use modular_mcp_gateway::{
    shutdown_signal, ConnectOutcome, InteractiveLock, ModularProxyHandler, SessionManager,
    SystemBrowser, TransportFactory, TransportOptions,
};
use modular_mcp_storage::{default_credentials_dir, FileCredentialStore};
use rmcp::ServiceExt;
use tracing::{info, warn};

use cli::{Args, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = logging::init_tracing(args.log_dir.as_deref())?;

    if let Some(Command::Migrate {
        config_path,
        output_path,
    }) = &args.command
    {
        return migrate::run(config_path, output_path.as_deref()).await;
    }
    serve(args).await
}

async fn serve(args: Args) -> anyhow::Result<()> {
    let config_path = args
        .config_path
        .context("a config file path is required")?;
    let config = load_config(&config_path)
        .await
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let credentials_dir: PathBuf = match args.credentials_dir {
        Some(dir) => dir,
        None => default_credentials_dir().context("could not determine the home directory")?,
    };
    info!(path = %credentials_dir.display(), "Using credential directory");

    let factory = TransportFactory::new(
        Arc::new(FileCredentialStore::new(credentials_dir)),
        InteractiveLock::new(),
        Arc::new(SystemBrowser),
        TransportOptions {
            connect_timeout: Duration::from_secs(args.connect_timeout_secs),
            oauth_timeout: Duration::from_millis(args.oauth_timeout_ms),
            default_callback_port: branding::DEFAULT_OAUTH_CALLBACK_PORT,
        },
    );
    let sessions = SessionManager::new(factory);

    let outcomes = tokio::select! {
        outcomes = sessions.connect_all(&config) => outcomes,
        _ = shutdown_signal() => {
            info!("Shutdown signal received during startup");
            sessions.disconnect_all().await;
            return Ok(());
        }
    };
    let connected = outcomes
        .iter()
        .filter(|o| matches!(o, ConnectOutcome::Connected { .. }))
        .count();
    info!(
        connected,
        failed = outcomes.len() - connected,
        "Startup sweep finished"
    );

    let service = ModularProxyHandler::new(sessions.clone())
        .serve(rmcp::transport::stdio())
        .await
        .context("failed to start MCP server on stdio")?;
    info!("{} serving on stdio", branding::DISPLAY_NAME);

    let cancel = service.cancellation_token();
    tokio::select! {
        result = service.waiting() => match result {
            Ok(reason) => info!(?reason, "MCP client disconnected"),
            Err(e) => warn!("MCP server task failed: {}", e),
        },
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            cancel.cancel();
        }
    }

    sessions.disconnect_all().await;
    info!("All upstream sessions closed");
    Ok(())
}
