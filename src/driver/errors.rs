//! Driver error types
//!
//! Numeric codes mirror the server's error codes so callers can tell an
//! unauthorized collection apart from a genuine failure.

use thiserror::Error;

/// The user may not run this command on the collection
pub const UNAUTHORIZED_COMMAND: i32 = 13;

/// The supplied credentials were rejected
pub const AUTHENTICATION_FAILED: i32 = 18;

/// A query argument was not understood
pub const BAD_VALUE: i32 = 2;

/// An aggregation stage name was not recognized
pub const UNRECOGNIZED_STAGE: i32 = 40324;

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Failures surfaced by a database driver
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// The server refused or failed an operation
    #[error("operation failed (code {code}): {message}")]
    OperationFailure { code: i32, message: String },

    /// No server answered within the selection deadline
    #[error("no server available: {0}")]
    ServerSelection(String),

    /// The connection dropped or could not be opened
    #[error("connection failure: {0}")]
    ConnectionFailure(String),

    /// Anything else the driver reports
    #[error("driver error: {0}")]
    Other(String),
}

impl DriverError {
    /// Create an operation failure with a server code
    pub fn operation(code: i32, message: impl Into<String>) -> Self {
        Self::OperationFailure {
            code,
            message: message.into(),
        }
    }

    /// Create the error a server returns for a forbidden collection
    pub fn unauthorized(collection: &str) -> Self {
        Self::operation(
            UNAUTHORIZED_COMMAND,
            format!("not authorized to query collection '{}'", collection),
        )
    }

    /// Returns the server code, if any
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::OperationFailure { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True for the "unauthorized command" code
    pub fn is_unauthorized(&self) -> bool {
        self.code() == Some(UNAUTHORIZED_COMMAND)
    }

    /// True for the "authentication failed" code
    pub fn is_authentication_failure(&self) -> bool {
        self.code() == Some(AUTHENTICATION_FAILED)
    }
}
