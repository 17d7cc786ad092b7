//! Operator vocabulary of the compiled query document

use std::fmt;

use serde_json::Value;

/// Field-level comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// field == value
    Eq,
    /// field != value
    Ne,
    /// field in values
    In,
    /// field not in values
    Nin,
    /// field > value
    Gt,
    /// field >= value
    Gte,
    /// field < value
    Lt,
    /// field <= value
    Lte,
    /// field is present (true) or absent (false)
    Exists,
    /// field matches a regular expression
    Regex,
    /// field geometry lies inside a region
    GeoWithin,
    /// field geometry shares any point with a region
    GeoIntersects,
    /// negates an operator document
    Not,
}

impl Operator {
    /// All operators, in declaration order
    pub const ALL: [Operator; 13] = [
        Operator::Eq,
        Operator::Ne,
        Operator::In,
        Operator::Nin,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::Exists,
        Operator::Regex,
        Operator::GeoWithin,
        Operator::GeoIntersects,
        Operator::Not,
    ];

    /// Returns the symbol used in query documents
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "$eq",
            Operator::Ne => "$ne",
            Operator::In => "$in",
            Operator::Nin => "$nin",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::Exists => "$exists",
            Operator::Regex => "$regex",
            Operator::GeoWithin => "$geoWithin",
            Operator::GeoIntersects => "$geoIntersects",
            Operator::Not => "$not",
        }
    }

    /// Looks up an operator by its symbol
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }

    /// Describes the accepted value shape, or None when any value is accepted
    pub(crate) fn expected_shape(&self) -> Option<&'static str> {
        match self {
            Operator::In | Operator::Nin => Some("an array"),
            Operator::Exists => Some("a boolean"),
            Operator::Regex => Some("a string"),
            Operator::GeoWithin | Operator::GeoIntersects | Operator::Not => Some("an object"),
            _ => None,
        }
    }

    /// Checks that a value has the shape this operator needs
    pub(crate) fn accepts(&self, value: &Value) -> bool {
        match self {
            Operator::In | Operator::Nin => value.is_array(),
            Operator::Exists => value.is_boolean(),
            Operator::Regex => value.is_string(),
            Operator::GeoWithin | Operator::GeoIntersects | Operator::Not => value.is_object(),
            _ => true,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Boolean combinators for composite filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combinator {
    /// Any operand matches
    Or,
    /// Every operand matches
    And,
}

impl Combinator {
    /// Returns the reserved key used in query documents
    pub fn symbol(&self) -> &'static str {
        match self {
            Combinator::Or => "$or",
            Combinator::And => "$and",
        }
    }

    /// Looks up a combinator by its reserved key
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "$or" => Some(Combinator::Or),
            "$and" => Some(Combinator::And),
            _ => None,
        }
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_symbols_round_trip() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_symbol(op.symbol()), Some(op));
        }
        assert_eq!(Operator::from_symbol("$near"), None);
    }

    #[test]
    fn test_value_shapes() {
        assert!(Operator::In.accepts(&json!([1, 2])));
        assert!(!Operator::In.accepts(&json!("abc")));
        assert!(!Operator::Nin.accepts(&json!(3)));
        assert!(Operator::Exists.accepts(&json!(false)));
        assert!(!Operator::Exists.accepts(&json!(1)));
        assert!(Operator::Eq.accepts(&json!(null)));
    }

    #[test]
    fn test_combinator_symbols() {
        assert_eq!(Combinator::from_symbol("$or"), Some(Combinator::Or));
        assert_eq!(Combinator::from_symbol("$and"), Some(Combinator::And));
        assert_eq!(Combinator::from_symbol("$nor"), None);
    }
}
