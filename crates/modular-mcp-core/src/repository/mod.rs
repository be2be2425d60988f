//! Repository traits for data access
//!
//! These traits define the interface for data storage without specifying
//! the implementation (files on disk, in-memory, etc.)

use async_trait::async_trait;

use crate::domain::{CredentialKind, PersistedCredential, UpstreamIdentity};

/// Result type for repository operations
pub type RepoResult<T> = anyhow::Result<T>;

/// Durable storage of OAuth artifacts per upstream identity
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read one artifact.
    ///
    /// Missing, unreadable or malformed data is reported as `None` so callers
    /// fall back to re-authorizing.
    async fn get(&self, identity: &UpstreamIdentity, kind: CredentialKind)
        -> Option<PersistedCredential>;

    /// Overwrite one artifact, creating the identity's storage location if needed
    async fn put(&self, identity: &UpstreamIdentity, credential: &PersistedCredential)
        -> RepoResult<()>;

    /// Remove one artifact; removing an absent artifact succeeds
    async fn delete(&self, identity: &UpstreamIdentity, kind: CredentialKind) -> RepoResult<()>;
}
