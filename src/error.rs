//! Error handling module for stagescript
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Text builders, backends, the selection engine and the stage driver all
//! report through `StageScriptError` so the driver can abort a stage before
//! anything is written.

use thiserror::Error;

/// Main error type for stagescript
#[derive(Error, Debug)]
pub enum StageScriptError {
    /// Malformed input handed to a text builder or backend
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The instance store has no definition for the requested uuid
    #[error("Missing instance definition: '{0}'")]
    MissingInstance(String),

    /// The deployment type has no backend implementation
    #[error("Unsupported deployment backend: '{0}'")]
    UnsupportedBackend(String),

    /// Configuration errors (loading, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors (script, status and store files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for stagescript operations
pub type Result<T> = std::result::Result<T, StageScriptError>;

// Convenient error constructors
impl StageScriptError {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a missing instance error
    pub fn missing_instance(uuid: impl Into<String>) -> Self {
        Self::MissingInstance(uuid.into())
    }

    /// Create an unsupported backend error
    pub fn unsupported_backend(kind: impl Into<String>) -> Self {
        Self::UnsupportedBackend(kind.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StageScriptError::invalid_argument("boolean expected: yes");
        assert_eq!(err.to_string(), "Invalid argument: boolean expected: yes");

        let err = StageScriptError::unsupported_backend("kubernetes");
        assert_eq!(
            err.to_string(),
            "Unsupported deployment backend: 'kubernetes'"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: StageScriptError = io_err.into();
        assert!(matches!(err, StageScriptError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: StageScriptError = json_err.into();
        assert!(matches!(err, StageScriptError::Json(_)));
    }

    #[test]
    fn test_error_constructors() {
        let err = StageScriptError::missing_instance("abc-123");
        assert!(matches!(err, StageScriptError::MissingInstance(ref u) if u == "abc-123"));

        let err = StageScriptError::config("empty status file name");
        assert!(matches!(err, StageScriptError::Config(_)));
    }
}
