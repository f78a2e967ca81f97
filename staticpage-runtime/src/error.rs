use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop `exec` from running at all.
///
/// Per-strategy failures are not errors here; they are reported in the
/// [`crate::ExecReport`].
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ExecError {
    ExecError::Io {
        path: path.into(),
        source,
    }
}
