//! Result and error types for Sanar.

use std::fmt;
use std::panic::Location;

use thiserror::Error;

/// Result type for Sanar operations
pub type SanarResult<T> = Result<T, SanarError>;

/// Errors that can occur in Sanar
#[derive(Debug, Error)]
pub enum SanarError {
    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Page error (closed page, lost connection)
    #[error("Page error: {message}")]
    Page {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// No element matched a locator
    #[error("No element found for {locator}")]
    ElementNotFound {
        /// Rendered locator
        locator: String,
    },

    /// An action could not be performed on a resolved element
    #[error("{action} failed: {message}")]
    Action {
        /// Action name
        action: String,
        /// Error message
        message: String,
    },

    /// In-page script evaluation error
    #[error("Evaluation failed: {message}")]
    Evaluation {
        /// Error message
        message: String,
    },

    /// Repair oracle transport or protocol error
    #[error("Repair oracle failed: {message}")]
    Oracle {
        /// Error message
        message: String,
    },

    /// Oracle output outside the accepted repair grammar
    #[error("Cannot interpret repair at offset {offset}: {message}")]
    Interpreter {
        /// Byte offset into the oracle output
        offset: usize,
        /// Error message
        message: String,
    },

    /// Heal store error
    #[error("Heal store error: {message}")]
    HealStore {
        /// Error message
        message: String,
    },

    /// Source patching error
    #[error("Patch failed: {message}")]
    Patch {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl SanarError {
    /// Create a page error
    #[must_use]
    pub fn page(message: impl Into<String>) -> Self {
        Self::Page {
            message: message.into(),
        }
    }

    /// Create an action error
    #[must_use]
    pub fn action(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Action {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Create an evaluation error
    #[must_use]
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }

    /// Create an oracle error
    #[must_use]
    pub fn oracle(message: impl Into<String>) -> Self {
        Self::Oracle {
            message: message.into(),
        }
    }

    /// Create an interpreter error at a byte offset
    #[must_use]
    pub fn interpreter(offset: usize, message: impl Into<String>) -> Self {
        Self::Interpreter {
            offset,
            message: message.into(),
        }
    }

    /// Create a heal store error
    #[must_use]
    pub fn heal_store(message: impl Into<String>) -> Self {
        Self::HealStore {
            message: message.into(),
        }
    }

    /// Create a patch error
    #[must_use]
    pub fn patch(message: impl Into<String>) -> Self {
        Self::Patch {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Error raised by the self-healing proxy when a step fails and cannot be healed.
///
/// Carries the original browser error unchanged, the source-like
/// reconstruction of the failing call and a stack trace pointing at the
/// line of the test script that issued it.
#[derive(Debug, Error)]
#[error("{source}\n  step: {step}\n  {stack}")]
pub struct StepFailure {
    /// The original error from the browser session
    #[source]
    pub source: SanarError,
    /// Source-like reconstruction of the failing call
    pub step: String,
    /// Stack trace (`at <file>:<line>:<column>` frames)
    pub stack: String,
}

impl StepFailure {
    /// Wrap a session error raised by the call at `site`.
    #[must_use]
    pub fn new(source: SanarError, step: impl Into<String>, site: &Location<'_>) -> Self {
        Self::at(source, step, &StackFrame::from(site))
    }

    /// Wrap a session error attributed to an explicit frame.
    #[must_use]
    pub fn at(source: SanarError, step: impl Into<String>, frame: &StackFrame) -> Self {
        Self {
            source,
            step: step.into(),
            stack: frame.to_string(),
        }
    }

    /// Error message without the stack trace
    #[must_use]
    pub fn message(&self) -> String {
        self.source.to_string()
    }
}

/// A single `at <file>:<line>:<column>` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Source file
    pub file: String,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl From<&Location<'_>> for StackFrame {
    fn from(site: &Location<'_>) -> Self {
        Self {
            file: site.file().to_string(),
            line: site.line(),
            column: site.column(),
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {}:{}:{}", self.file, self.line, self.column)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_error_display() {
        let err = SanarError::Navigation {
            url: "http://x".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Navigation to http://x failed: boom");
    }

    #[test]
    fn test_interpreter_error_carries_offset() {
        let err = SanarError::interpreter(7, "unexpected token");
        assert!(err.to_string().contains("offset 7"));
    }

    #[test]
    fn test_step_failure_stack_points_at_caller() {
        let site = Location::caller();
        let failure = StepFailure::new(
            SanarError::ElementNotFound {
                locator: "#submit-old".to_string(),
            },
            "page.click('#submit-old')",
            site,
        );
        assert!(failure.stack.starts_with("at "));
        assert!(failure.stack.contains("result.rs"));
        assert!(failure.to_string().contains("#submit-old"));
        assert_eq!(failure.message(), "No element found for #submit-old");
    }

    #[test]
    fn test_io_error_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SanarError = io.into();
        assert!(err.to_string().contains("I/O"));
    }
}
