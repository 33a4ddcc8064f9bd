//! Error types for the file store.

use std::path::PathBuf;

use thiserror::Error;

use crate::download::DownloadError;

/// Errors raised while resolving a file reference into a stored file.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store root cannot be created or written to.
    #[error("storage root {path} is not usable: {source}")]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem error while probing, hashing or moving a file.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Fetching the file failed.
    #[error(transparent)]
    Download(#[from] DownloadError),
}

impl StoreError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
