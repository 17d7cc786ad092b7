//! Crate-wide error type
//!
//! Error codes:
//! - QUERIER_INVALID_FILTER
//! - QUERIER_CREDENTIALS
//! - QUERIER_AUTHENTICATION
//! - QUERIER_SERVER
//! - QUERIER_INTERNAL
//! - QUERIER_CLOSED

use thiserror::Error;

use crate::connection::CredentialsError;
use crate::driver::DriverError;
use crate::filter::FilterError;

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors surfaced to callers of the query layer
#[derive(Debug, Error)]
pub enum QueryError {
    /// Filter construction broke an invariant
    #[error(transparent)]
    InvalidFilter(#[from] FilterError),

    /// Credentials file could not be read or resolved
    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    /// The server rejected the credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The server could not be reached
    #[error("Server error: {0}")]
    Server(String),

    /// Unhandled driver failure during query execution
    #[error("Internal error: {0}")]
    Internal(#[source] DriverError),

    /// The connection was already closed
    #[error("Connection is closed")]
    Closed,
}

impl QueryError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::InvalidFilter(_) => "QUERIER_INVALID_FILTER",
            QueryError::Credentials(_) => "QUERIER_CREDENTIALS",
            QueryError::Authentication(_) => "QUERIER_AUTHENTICATION",
            QueryError::Server(_) => "QUERIER_SERVER",
            QueryError::Internal(_) => "QUERIER_INTERNAL",
            QueryError::Closed => "QUERIER_CLOSED",
        }
    }

    /// Returns the wrapped driver error, if any
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            QueryError::Internal(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DriverError> for QueryError {
    fn from(err: DriverError) -> Self {
        QueryError::Internal(err)
    }
}
