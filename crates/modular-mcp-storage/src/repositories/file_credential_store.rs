//! File implementation of CredentialStore.
//!
//! Every artifact is a whole-file replace: the content goes to a private
//! temp file in the same directory which is then renamed over the target,
//! so readers see the old or the new artifact and never a torn write. Reads
//! never fail: missing or malformed files are logged and reported as absent.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use modular_mcp_core::{CredentialKind, CredentialStore, PersistedCredential, UpstreamIdentity};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::StorageError;

/// Credential store rooted at a base directory
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    base_dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding all artifacts of one identity
    pub fn identity_dir(&self, identity: &UpstreamIdentity) -> PathBuf {
        let digest = Sha256::digest(identity.as_str().as_bytes());
        self.base_dir.join(hex::encode(digest))
    }

    fn file_path(&self, identity: &UpstreamIdentity, kind: CredentialKind) -> PathBuf {
        self.identity_dir(identity).join(file_name(kind))
    }

    async fn read(&self, path: &Path, kind: CredentialKind) -> Result<Option<PersistedCredential>, StorageError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StorageError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let corrupt = |reason: String| StorageError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };

        let credential = match kind {
            CredentialKind::Client => PersistedCredential::Client(
                serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?,
            ),
            CredentialKind::Tokens => PersistedCredential::Tokens(
                serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?,
            ),
            CredentialKind::Verifier => {
                let verifier = content.trim();
                if verifier.is_empty() {
                    return Err(corrupt("empty code verifier".to_string()));
                }
                PersistedCredential::Verifier(verifier.to_string())
            }
            CredentialKind::CallbackPort => PersistedCredential::CallbackPort(
                content
                    .trim()
                    .parse::<u16>()
                    .map_err(|e| corrupt(e.to_string()))?,
            ),
        };
        Ok(Some(credential))
    }
}

fn file_name(kind: CredentialKind) -> &'static str {
    match kind {
        CredentialKind::Client => "client.json",
        CredentialKind::Tokens => "tokens.json",
        CredentialKind::Verifier => "verifier.txt",
        CredentialKind::CallbackPort => "callback-port",
    }
}

/// Owner-only on unix; credentials never land world-readable
async fn create_private(path: &Path) -> std::io::Result<tokio::fs::File> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    options.open(path).await
}

async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
    let written = async {
        let mut file = create_private(&tmp).await?;
        file.write_all(content).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e).with_context(|| format!("Failed to write {}", path.display()));
    }
    Ok(())
}

fn serialize(credential: &PersistedCredential) -> Result<String> {
    Ok(match credential {
        PersistedCredential::Client(client) => serde_json::to_string_pretty(client)?,
        PersistedCredential::Tokens(tokens) => serde_json::to_string_pretty(tokens)?,
        PersistedCredential::Verifier(verifier) => verifier.clone(),
        PersistedCredential::CallbackPort(port) => port.to_string(),
    })
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(
        &self,
        identity: &UpstreamIdentity,
        kind: CredentialKind,
    ) -> Option<PersistedCredential> {
        let path = self.file_path(identity, kind);
        match self.read(&path, kind).await {
            Ok(found) => found,
            Err(e) => {
                warn!(identity = %identity, kind = kind.as_str(), error = %e, "Ignoring stored credential");
                None
            }
        }
    }

    async fn put(&self, identity: &UpstreamIdentity, credential: &PersistedCredential) -> Result<()> {
        let dir = self.identity_dir(identity);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let kind = credential.kind();
        let path = dir.join(file_name(kind));
        write_atomic(&path, serialize(credential)?.as_bytes()).await?;

        debug!(identity = %identity, kind = kind.as_str(), "Stored credential");
        Ok(())
    }

    async fn delete(&self, identity: &UpstreamIdentity, kind: CredentialKind) -> Result<()> {
        let path = self.file_path(identity, kind);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(identity = %identity, kind = kind.as_str(), "Deleted credential");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }
}
