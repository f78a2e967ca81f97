//! Error types for staticpage-renderer.

use std::any::Any;

use serde::Serialize;
use thiserror::Error;

use staticpage_core::ComponentError;

/// All errors that can arise while rendering or piping a view tree.
///
/// Cloneable and serializable: the same error is both queued as a stream
/// event and logged as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderError {
    /// A component returned an error.
    #[error(transparent)]
    Component(#[from] ComponentError),

    /// Deferred content was abandoned by `abort()`.
    #[error("render aborted: {reason}")]
    Aborted { reason: String },

    /// A component or deferred content future panicked.
    #[error("render panicked: {message}")]
    Panicked { message: String },

    /// Writing to the pipe destination failed.
    #[error("pipe destination error: {message}")]
    Destination { message: String },

    /// `pipe()` was called on a stream whose shell failed.
    #[error("the shell failed to render; nothing to pipe")]
    ShellFailed,

    /// `pipe()` was called twice.
    #[error("stream has already been piped")]
    AlreadyPiped,
}

impl RenderError {
    pub(crate) fn destination(source: std::io::Error) -> Self {
        RenderError::Destination {
            message: source.to_string(),
        }
    }

    pub(crate) fn panicked(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic payload".to_string()
        };
        RenderError::Panicked { message }
    }
}
