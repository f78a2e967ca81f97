//! Error types for staticpage-core.

use serde::Serialize;
use thiserror::Error;

/// Failure raised by a component while producing its view.
///
/// Serializable so render failures can be logged as a single JSON line.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("component `{component}` failed: {message}")]
pub struct ComponentError {
    /// Name of the failing component.
    pub component: String,
    /// Human-readable failure message.
    pub message: String,
}

impl ComponentError {
    pub fn new(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_component_and_message() {
        let err = ComponentError::new("Header", "missing title");
        assert_eq!(err.to_string(), "component `Header` failed: missing title");
    }

    #[test]
    fn serializes_as_flat_json_object() {
        let err = ComponentError::new("Header", "boom");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["component"], "Header");
        assert_eq!(json["message"], "boom");
    }
}
