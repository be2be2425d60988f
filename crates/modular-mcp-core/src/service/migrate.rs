//! Convert a standard MCP client config into a modular config
//!
//! The standard file is rewritten so the client launches this proxy, which in
//! turn loads the generated modular config.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::branding;
use crate::domain::{ConfigError, McpServerConfig, ServerConfig, StandardServerConfig, TransportConfig};

/// Paths touched by a completed migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub original_path: PathBuf,
    pub modular_path: PathBuf,
}

/// Read and validate a standard `{ "mcpServers": { ... } }` file
pub async fn read_standard_config(path: &Path) -> Result<StandardServerConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Attach descriptions to every standard entry. Blank descriptions are rejected.
pub fn to_modular_config(
    standard: &StandardServerConfig,
    descriptions: &BTreeMap<String, String>,
) -> Result<ServerConfig, ConfigError> {
    let mut mcp_servers = BTreeMap::new();
    for (name, transport) in &standard.mcp_servers {
        let description = descriptions
            .get(name)
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| ConfigError::MissingDescription(name.clone()))?;

        mcp_servers.insert(
            name.clone(),
            McpServerConfig {
                description: description.to_string(),
                transport: transport.clone(),
            },
        );
    }

    Ok(ServerConfig {
        schema: Some(branding::CONFIG_SCHEMA_URL.to_string()),
        mcp_servers,
    })
}

/// Standard config that launches this proxy with `modular_config_path`
pub fn launcher_config(modular_config_path: &Path) -> StandardServerConfig {
    let mut mcp_servers = BTreeMap::new();
    mcp_servers.insert(
        branding::APP_NAME.to_string(),
        TransportConfig::Stdio {
            command: branding::APP_NAME.to_string(),
            args: vec![modular_config_path.display().to_string()],
            env: BTreeMap::new(),
        },
    );
    StandardServerConfig { mcp_servers }
}

/// Where the modular config goes: `output` if given, else next to the input file
pub fn resolve_output_path(input: &Path, output: Option<&Path>) -> PathBuf {
    match output {
        Some(path) => path.to_path_buf(),
        None => input
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(branding::DEFAULT_CONFIG_FILE),
    }
}

/// Write the modular config and point the original file at it
pub async fn write_migration(
    input: &Path,
    output: Option<&Path>,
    standard: &StandardServerConfig,
    descriptions: &BTreeMap<String, String>,
) -> Result<MigrationOutcome, ConfigError> {
    let original_path = absolutize(input)?;
    let modular_path = absolutize(&resolve_output_path(&original_path, output))?;

    let modular = to_modular_config(standard, descriptions)?;
    write_json_file(&modular_path, &modular).await?;
    info!(path = %modular_path.display(), "Modular MCP configuration written");

    write_json_file(&original_path, &launcher_config(&modular_path)).await?;
    info!(path = %original_path.display(), "Original configuration updated");

    Ok(MigrationOutcome {
        original_path,
        modular_path,
    })
}

/// Pretty JSON with a trailing newline, overwriting `path`
pub async fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    let mut json = serde_json::to_string_pretty(value).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    json.push('\n');
    tokio::fs::write(path, json)
        .await
        .map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
}

fn absolutize(path: &Path) -> Result<PathBuf, ConfigError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })
}
