//! Error types for Techne operations

use crate::spec::SpecError;
use crate::tools::ToolCallError;

/// Result type for Techne operations
pub type Result<T> = std::result::Result<T, TechneError>;

/// Boxed error used by constructor callbacks and external collaborators
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error types for the Techne framework
#[derive(Debug, thiserror::Error)]
pub enum TechneError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Spec parsing, registry construction or instantiation failed
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// A user-supplied component broke a history invariant
    #[error("{0}")]
    User(String),

    /// Model or secondary agent failure
    #[error("Model error: {0}")]
    Model(#[source] BoxError),

    /// Tool call was denied, needs approval, or failed
    #[error(transparent)]
    ToolCall(#[from] ToolCallError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl TechneError {
    /// Wrap an external model or agent failure
    pub fn model(err: impl Into<BoxError>) -> Self {
        TechneError::Model(err.into())
    }
}

impl From<String> for TechneError {
    fn from(s: String) -> Self {
        TechneError::Other(s)
    }
}

impl From<&str> for TechneError {
    fn from(s: &str) -> Self {
        TechneError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for TechneError {
    fn from(err: anyhow::Error) -> Self {
        TechneError::Other(err.to_string())
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_model_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
        let err = TechneError::model(io);
        assert_eq!(err.to_string(), "Model error: connection reset");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_string_conversions() {
        let err: TechneError = "boom".into();
        assert!(matches!(err, TechneError::Other(ref s) if s == "boom"));
        let err: TechneError = anyhow::anyhow!("wrapped").into();
        assert_eq!(err.to_string(), "wrapped");
    }
}
