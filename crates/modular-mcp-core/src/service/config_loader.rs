use std::path::Path;
use tracing::{debug, info};

use crate::domain::{ConfigError, ServerConfig};

/// Read, validate and environment-substitute a modular config file
pub async fn load_config(path: impl AsRef<Path>) -> Result<ServerConfig, ConfigError> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let config = parse_config(&content, path, |name| std::env::var(name).ok())?;
    info!(
        path = %path.display(),
        servers = config.mcp_servers.len(),
        "MCP server config loaded"
    );
    Ok(config)
}

/// Parse config text and substitute variables with `lookup`
pub fn parse_config<F>(content: &str, path: &Path, lookup: F) -> Result<ServerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw: ServerConfig =
        serde_json::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(servers = ?raw.mcp_servers.keys().collect::<Vec<_>>(), "Parsed server entries");

    raw.substitute_env_with(lookup)
}
