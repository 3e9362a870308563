use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("no backing file bound to this binary store")]
    Unbound,

    #[error("failed to replace {} with its staged rewrite: {source}", path.display())]
    Swap { path: PathBuf, source: io::Error },

    #[error("session keys not loaded: unlock the session first")]
    SessionLocked,

    #[error("custom field name must not be empty")]
    EmptyFieldName,

    #[error("transport encoding error: {0}")]
    Transport(#[from] serde_json::Error),
}
