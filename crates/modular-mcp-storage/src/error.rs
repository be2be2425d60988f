use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("credential file {} is unreadable: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("credential file {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}
