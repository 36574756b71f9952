//! Error types for aadb

use std::fmt;
use thiserror::Error;

/// Result type alias for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// An error reported by the wrapped driver.
///
/// Drivers hand this back either through the error slot of a [`Completion`](crate::Completion)
/// or as the synchronous `Err` of a handle method. The adapter never rewrites it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    /// Driver-specific error code (e.g. `SQLITE_CONSTRAINT`), if any.
    pub code: Option<String>,
    /// Human-readable message.
    pub message: String,
}

impl DriverError {
    /// Create an error with a message and no code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Create an error carrying a driver error code.
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for DriverError {}

/// Error types for instrumented calls
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// Instrumentation was requested for something that is not a handle
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The driver failed, either through its completion or synchronously
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// The method was not made awaitable on this handle
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// The driver dropped the completion without invoking it
    #[error("Completion for '{0}' was dropped without being called")]
    CompletionDropped(String),
}

impl AdapterError {
    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// The driver error carried by this error, if it came from the driver.
    pub fn as_driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::Driver(err) => Some(err),
            _ => None,
        }
    }

    /// Check if this is a driver error
    pub fn is_driver_error(&self) -> bool {
        matches!(self, Self::Driver(_))
    }

    /// Check if this is an invalid argument error
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}
