//! Command line arguments

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "modular-mcp",
    version,
    about = "Expose many MCP servers as on-demand tool groups",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
pub struct Args {
    /// Path to the modular MCP configuration file
    #[arg(required = true)]
    pub config_path: Option<PathBuf>,

    /// How long to wait for the browser to complete an OAuth authorization
    #[arg(long, env = "MODULAR_MCP_OAUTH_TIMEOUT_MS", default_value_t = 300_000)]
    pub oauth_timeout_ms: u64,

    /// Handshake timeout per upstream server
    #[arg(long, env = "MODULAR_MCP_CONNECT_TIMEOUT_SECS", default_value_t = 30)]
    pub connect_timeout_secs: u64,

    /// Also write daily-rotated log files to this directory
    #[arg(long, env = "MODULAR_MCP_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Where OAuth credentials are stored (default: ~/.modular-mcp/oauth-servers)
    #[arg(long, env = "MODULAR_MCP_CREDENTIALS_DIR")]
    pub credentials_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert a standard MCP client config into a modular one
    Migrate {
        /// Standard `{ "mcpServers": ... }` file to convert
        config_path: PathBuf,

        /// Where to write the modular config (default: next to the input)
        #[arg(short = 'o', long)]
        output_path: Option<PathBuf>,
    },
}
