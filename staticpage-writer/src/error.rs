//! Error types for staticpage-writer.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while writing or comparing documents.
#[derive(Debug, Error)]
pub enum WriteError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A document expected on disk is missing.
    #[error("document not found at {path}")]
    Missing { path: PathBuf },
}

/// Convenience constructor for [`WriteError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> WriteError {
    WriteError::Io {
        path: path.into(),
        source,
    }
}
