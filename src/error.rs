//! Error types for Heddle.
//!
//! Lookups never fail: an unknown key resolves to `None` or an empty label.
//! The variants below are reserved for mutations that would leave the
//! transition graph dangling or inconsistent, and for storage failures.

use thiserror::Error;

/// The main error type for Heddle operations.
///
/// This enum uses `#[non_exhaustive]` to allow adding new error variants
/// in the future without breaking backward compatibility.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HeddleError {
    /// A state key does not exist in the registry.
    #[error("State not found: {0}")]
    StateNotFound(String),

    /// Two states share the same key.
    #[error("Duplicate state key: {0}")]
    DuplicateState(String),

    /// No workflow with the given ID exists in the store.
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    /// A transition from a state to itself was requested.
    #[error("Self-transition not allowed: {0}")]
    SelfTransition(String),

    /// Workflow definition is structurally invalid.
    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    /// An editor operation was attempted with no open session.
    #[error("Transition editor is not open")]
    EditorClosed,

    /// A toggled key is not a destination candidate for the open session.
    #[error("State {to} is not a transition candidate for {from}")]
    NotACandidate {
        /// Source state of the open session.
        from: String,
        /// The rejected destination.
        to: String,
    },

    /// Error occurred in the workflow store layer.
    #[error("Workflow store error: {0}")]
    Store(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error from file or database operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for HeddleError {
    fn from(err: config::ConfigError) -> Self {
        HeddleError::Config(err.to_string())
    }
}

/// A specialized `Result` type for Heddle operations.
pub type Result<T> = std::result::Result<T, HeddleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_state_not_found() {
        let error = HeddleError::StateNotFound("todo".to_string());
        assert_eq!(error.to_string(), "State not found: todo");
    }

    #[test]
    fn test_error_display_duplicate_state() {
        let error = HeddleError::DuplicateState("done".to_string());
        assert_eq!(error.to_string(), "Duplicate state key: done");
    }

    #[test]
    fn test_error_display_self_transition() {
        let error = HeddleError::SelfTransition("todo".to_string());
        assert_eq!(error.to_string(), "Self-transition not allowed: todo");
    }

    #[test]
    fn test_error_display_workflow_not_found() {
        let error = HeddleError::WorkflowNotFound("wf-1".to_string());
        assert_eq!(error.to_string(), "Workflow not found: wf-1");
    }

    #[test]
    fn test_error_display_editor_closed() {
        assert_eq!(
            HeddleError::EditorClosed.to_string(),
            "Transition editor is not open"
        );
    }

    #[test]
    fn test_error_display_not_a_candidate() {
        let error = HeddleError::NotACandidate {
            from: "todo".to_string(),
            to: "todo".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "State todo is not a transition candidate for todo"
        );
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error: HeddleError = json_error.into();
        assert!(error.to_string().contains("Serialization error"));
    }

    #[test]
    fn test_error_from_io() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: HeddleError = io_error.into();
        assert!(error.to_string().contains("I/O error"));
    }

    #[test]
    fn test_error_from_config() {
        let config_error = config::ConfigError::Message("bad value".to_string());
        let error: HeddleError = config_error.into();
        assert_eq!(error.to_string(), "Configuration error: bad value");
    }
}
