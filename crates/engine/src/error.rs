use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no indexed entry for {0}")]
    NotFound(String),

    #[error("failed to read record {path}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write record {path}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("index storage I/O failed")]
    Io(#[from] io::Error),

    #[error("index file {path:?} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
