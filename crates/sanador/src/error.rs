//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Requested item does not exist
    #[error("Not found: {message}")]
    NotFound {
        /// Error message
        message: String,
    },

    /// Feature compiled out of this build
    #[error("{feature} support not enabled. Rebuild with --features {feature}")]
    FeatureDisabled {
        /// Cargo feature name
        feature: &'static str,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Sanar library error
    #[error("{0}")]
    Sanar(#[from] sanar::SanarError),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a not-found error
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = CliError::config("bad yaml");
        assert!(err.to_string().contains("bad yaml"));
    }

    #[test]
    fn test_invalid_argument_error() {
        let err = CliError::invalid_argument("--line 0");
        assert!(err.to_string().contains("--line 0"));
    }

    #[test]
    fn test_feature_disabled() {
        let err = CliError::FeatureDisabled { feature: "browser" };
        assert_eq!(
            err.to_string(),
            "browser support not enabled. Rebuild with --features browser"
        );
    }

    #[test]
    fn test_from_sanar_keeps_message() {
        let err: CliError = sanar::SanarError::Timeout { ms: 100 }.into();
        assert_eq!(err.to_string(), "Operation timed out after 100ms");
    }

    #[test]
    fn test_from_io() {
        let err: CliError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, CliError::Io(_)));
    }
}
