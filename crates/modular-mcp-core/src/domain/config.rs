//! Server configuration file format
//!
//! ```json
//! {
//!   "$schema": "https://.../config-schema.json",
//!   "mcpServers": {
//!     "files": { "description": "Local files", "command": "npx", "args": ["-y", "fs-server"] },
//!     "linear": { "type": "http", "description": "Issue tracker", "url": "https://mcp.linear.app/mcp" }
//!   }
//! }
//! ```
//!
//! Entries keep the standard MCP shape (transport fields at the top level, `type`
//! defaulting to `stdio`) plus a `description` used in tool listings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use super::env::substitute_env_vars;

/// Errors raised while reading, validating or rewriting configuration files
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid server entry: {0}")]
    InvalidEntry(String),

    #[error("failed to substitute environment variables in server '{server}': environment variable '{variable}' is not defined")]
    UndefinedVariable { server: String, variable: String },

    #[error("missing description for server '{0}'")]
    MissingDescription(String),
}

/// Declared transport kind of one upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Stdio,
    Http,
    Sse,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Stdio => "stdio",
            TransportKind::Http => "http",
            TransportKind::Sse => "sse",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to reach one upstream MCP server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTransport", into = "RawTransport")]
pub enum TransportConfig {
    /// Spawn a local subprocess speaking MCP over stdio
    Stdio {
        command: String,
        args: Vec<String>,
        env: BTreeMap<String, String>,
    },
    /// Streamable HTTP endpoint
    Http {
        url: String,
        headers: BTreeMap<String, String>,
    },
    /// Server-sent events endpoint
    Sse {
        url: String,
        headers: BTreeMap<String, String>,
    },
}

impl TransportConfig {
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportConfig::Stdio { .. } => TransportKind::Stdio,
            TransportConfig::Http { .. } => TransportKind::Http,
            TransportConfig::Sse { .. } => TransportKind::Sse,
        }
    }

    /// Short human readable summary, e.g. `command: npx` or `http: https://...`
    pub fn summary(&self) -> String {
        match self {
            TransportConfig::Stdio { command, .. } => format!("command: {}", command),
            TransportConfig::Http { url, .. } => format!("http: {}", url),
            TransportConfig::Sse { url, .. } => format!("sse: {}", url),
        }
    }

    /// Substitute `$VAR` / `${VAR}` references using the process environment.
    ///
    /// Stdio entries substitute `args` and `env` values; HTTP and SSE entries
    /// substitute `url` and `headers` values.
    pub fn substitute_env(&self, server: &str) -> Result<Self, ConfigError> {
        self.substitute_env_with(server, |name| std::env::var(name).ok())
    }

    /// Same as [`substitute_env`](Self::substitute_env) with an explicit lookup
    pub fn substitute_env_with<F>(&self, server: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let sub = |value: &str| {
            substitute_env_vars(value, &lookup).map_err(|variable| {
                ConfigError::UndefinedVariable {
                    server: server.to_string(),
                    variable,
                }
            })
        };
        let sub_map = |map: &BTreeMap<String, String>| {
            map.iter()
                .map(|(k, v)| Ok((k.clone(), sub(v)?)))
                .collect::<Result<BTreeMap<_, _>, ConfigError>>()
        };

        Ok(match self {
            TransportConfig::Stdio { command, args, env } => TransportConfig::Stdio {
                command: command.clone(),
                args: args.iter().map(|a| sub(a)).collect::<Result<_, _>>()?,
                env: sub_map(env)?,
            },
            TransportConfig::Http { url, headers } => TransportConfig::Http {
                url: sub(url)?,
                headers: sub_map(headers)?,
            },
            TransportConfig::Sse { url, headers } => TransportConfig::Sse {
                url: sub(url)?,
                headers: sub_map(headers)?,
            },
        })
    }
}

/// Flat on-disk shape of a transport entry
#[derive(Debug, Default, Serialize, Deserialize)]
struct RawTransport {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<TransportKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    env: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    headers: Option<BTreeMap<String, String>>,
}

impl TryFrom<RawTransport> for TransportConfig {
    type Error = ConfigError;

    fn try_from(raw: RawTransport) -> Result<Self, Self::Error> {
        let kind = raw.kind.unwrap_or(TransportKind::Stdio);
        match kind {
            TransportKind::Stdio => {
                if raw.url.is_some() {
                    return Err(ConfigError::InvalidEntry(
                        "'url' requires \"type\": \"http\" or \"sse\"".to_string(),
                    ));
                }
                let command = raw.command.ok_or_else(|| {
                    ConfigError::InvalidEntry("stdio server requires 'command'".to_string())
                })?;
                Ok(TransportConfig::Stdio {
                    command,
                    args: raw.args.unwrap_or_default(),
                    env: raw.env.unwrap_or_default(),
                })
            }
            TransportKind::Http | TransportKind::Sse => {
                let url = raw.url.ok_or_else(|| {
                    ConfigError::InvalidEntry(format!("{} server requires 'url'", kind))
                })?;
                let headers = raw.headers.unwrap_or_default();
                Ok(if kind == TransportKind::Http {
                    TransportConfig::Http { url, headers }
                } else {
                    TransportConfig::Sse { url, headers }
                })
            }
        }
    }
}

impl From<TransportConfig> for RawTransport {
    fn from(config: TransportConfig) -> Self {
        let non_empty = |map: BTreeMap<String, String>| (!map.is_empty()).then_some(map);
        match config {
            TransportConfig::Stdio { command, args, env } => RawTransport {
                kind: Some(TransportKind::Stdio),
                command: Some(command),
                args: (!args.is_empty()).then_some(args),
                env: non_empty(env),
                ..Default::default()
            },
            TransportConfig::Http { url, headers } => RawTransport {
                kind: Some(TransportKind::Http),
                url: Some(url),
                headers: non_empty(headers),
                ..Default::default()
            },
            TransportConfig::Sse { url, headers } => RawTransport {
                kind: Some(TransportKind::Sse),
                url: Some(url),
                headers: non_empty(headers),
                ..Default::default()
            },
        }
    }
}

/// One configured group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// What this group provides; shown to the model in tool listings
    pub description: String,
    #[serde(flatten)]
    pub transport: TransportConfig,
}

/// The modular config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(rename = "mcpServers")]
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
}

impl ServerConfig {
    /// Apply environment substitution to every entry
    pub fn substitute_env_with<F>(self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut mcp_servers = BTreeMap::new();
        for (name, entry) in self.mcp_servers {
            let transport = entry.transport.substitute_env_with(&name, &lookup)?;
            mcp_servers.insert(
                name,
                McpServerConfig {
                    description: entry.description,
                    transport,
                },
            );
        }
        Ok(Self {
            schema: self.schema,
            mcp_servers,
        })
    }
}

/// A standard MCP client config (Claude Desktop, Cursor, ...) without descriptions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardServerConfig {
    #[serde(rename = "mcpServers")]
    pub mcp_servers: BTreeMap<String, TransportConfig>,
}
