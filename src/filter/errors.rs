//! Filter construction errors
//!
//! Every variant is raised at the call that breaks a filter invariant,
//! never deferred to query time.

use thiserror::Error;

use super::operator::{Combinator, Operator};

/// Result type for filter operations
pub type FilterResult<T> = Result<T, FilterError>;

/// Invalid filter construction
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// Field path was empty
    #[error("Invalid filter: field path must not be empty")]
    EmptyField,

    /// Field condition added to an AND/OR filter
    #[error("Invalid filter: cannot add a field condition to a composite filter")]
    CompositeFilter,

    /// Operator value has the wrong shape
    #[error("Invalid filter: operator '{operator}' expects {expected}")]
    InvalidValue {
        operator: Operator,
        expected: &'static str,
    },

    /// One side of an AND/OR combination is empty
    #[error("Invalid filter: cannot apply '{combinator}' with an empty filter")]
    EmptyOperand { combinator: Combinator },

    /// Geometry coordinates are malformed
    #[error("Invalid filter: bad geometry: {0}")]
    InvalidGeometry(String),

    /// Unrecognized operator symbol in a query document
    #[error("Invalid filter: unknown operator '{0}'")]
    UnknownOperator(String),

    /// Query document does not follow the filter grammar
    #[error("Invalid filter: malformed query: {0}")]
    MalformedQuery(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_operator() {
        let err = FilterError::InvalidValue {
            operator: Operator::In,
            expected: "an array",
        };
        assert_eq!(err.to_string(), "Invalid filter: operator '$in' expects an array");
    }

    #[test]
    fn test_empty_operand_names_combinator() {
        let err = FilterError::EmptyOperand {
            combinator: Combinator::Or,
        };
        assert!(err.to_string().contains("$or"));
    }
}
