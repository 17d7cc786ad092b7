//! CLI-specific error types
//!
//! Every CLI error is fatal: the message goes to stderr and the process
//! exits non-zero.

use std::fmt;
use std::io;

use crate::error::QueryError;
use crate::filter::FilterError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Bad command-line input
    InvalidArgument,
    /// I/O error (stdout, data directory)
    IoError,
    /// Query layer failure
    QueryFailed,
    /// Logging could not be initialized
    LoggingError,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "QUERIER_CLI_INVALID_ARGUMENT",
            Self::IoError => "QUERIER_CLI_IO_ERROR",
            Self::QueryFailed => "QUERIER_CLI_QUERY_FAILED",
            Self::LoggingError => "QUERIER_CLI_LOGGING_ERROR",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidArgument, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn logging_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::LoggingError, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<QueryError> for CliError {
    fn from(e: QueryError) -> Self {
        Self::new(CliErrorCode::QueryFailed, format!("[{}] {}", e.code(), e))
    }
}

impl From<FilterError> for CliError {
    fn from(e: FilterError) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let err = CliError::invalid_argument("bad filter");
        assert_eq!(err.to_string(), "QUERIER_CLI_INVALID_ARGUMENT: bad filter");
        assert_eq!(err.code(), &CliErrorCode::InvalidArgument);
    }

    #[test]
    fn test_query_error_keeps_its_code() {
        let err = CliError::from(QueryError::Closed);
        assert_eq!(err.code_str(), "QUERIER_CLI_QUERY_FAILED");
        assert!(err.message().starts_with("[QUERIER_CLOSED]"));
    }
}
