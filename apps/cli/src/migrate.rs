//! Interactive `migrate` subcommand

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use modular_mcp_core::migrate::{read_standard_config, write_migration};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

pub async fn run(config_path: &Path, output_path: Option<&Path>) -> anyhow::Result<()> {
    let standard = read_standard_config(config_path).await?;
    if standard.mcp_servers.is_empty() {
        anyhow::bail!("no servers found in {}", config_path.display());
    }

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut descriptions = BTreeMap::new();

    for (name, transport) in &standard.mcp_servers {
        let description = loop {
            let prompt = format!(
                "Enter description for server \"{}\" ({}, {}): ",
                name,
                transport.kind(),
                transport.summary()
            );
            stdout.write_all(prompt.as_bytes()).await?;
            stdout.flush().await?;

            let line = lines
                .next_line()
                .await?
                .context("input closed before all descriptions were entered")?;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                break trimmed.to_string();
            }
            stdout.write_all(b"Description cannot be empty.\n").await?;
        };
        descriptions.insert(name.clone(), description);
    }

    let outcome = write_migration(config_path, output_path, &standard, &descriptions).await?;

    let summary = format!(
        "\nMigration completed.\n  modular config: {}\n  updated config: {}\n",
        outcome.modular_path.display(),
        outcome.original_path.display()
    );
    stdout.write_all(summary.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}
