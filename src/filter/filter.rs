//! Fluent filter builder

use std::fmt;

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use serde_json::Value;

use super::errors::{FilterError, FilterResult};
use super::geo::Geometry;
use super::node::FilterNode;
use super::operator::{Combinator, Operator};
use crate::driver::Document;

/// Search criteria for extracting documents from a database.
///
/// An empty filter matches every document. Each condition method adds a
/// constraint that must hold together with the others (AND). Use
/// [`Filter::or_filter`] and [`Filter::and_filter`] to combine whole filters.
///
/// Nested fields use dot notation:
///
/// ```
/// use querier::Filter;
///
/// let mut filter = Filter::new();
/// filter
///     .any_of("place.country_code", ["ES", "FR", "PT"])?
///     .greater_than("favorite_count", 100)?;
///
/// assert_eq!(
///     serde_json::Value::Object(filter.get_query()),
///     serde_json::json!({
///         "place.country_code": {"$in": ["ES", "FR", "PT"]},
///         "favorite_count": {"$gt": 100}
///     })
/// );
/// # Ok::<(), querier::FilterError>(())
/// ```
///
/// A filter cannot be combined with itself; the borrow checker rejects it:
///
/// ```compile_fail
/// use querier::Filter;
///
/// let mut filter = Filter::new();
/// filter.equals("x", 1).unwrap();
/// filter.or_filter(&filter).unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    node: FilterNode,
}

impl Filter {
    /// Creates an empty filter that matches every document
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a compiled query document back into a filter
    pub fn from_query(query: &Document) -> FilterResult<Self> {
        Ok(Self {
            node: FilterNode::from_document(query)?,
        })
    }

    /// Returns the predicate tree
    pub fn node(&self) -> &FilterNode {
        &self.node
    }

    /// Returns the compiled query document
    pub fn get_query(&self) -> Document {
        self.node.to_document()
    }

    /// True if the filter has no conditions
    pub fn is_empty(&self) -> bool {
        self.node.is_empty()
    }

    /// True if the filter is an AND/OR combination
    pub fn is_composite(&self) -> bool {
        self.node.is_composite()
    }

    /// Stores `value` under `operator` for `field`.
    ///
    /// Different operators on one field accumulate; the same operator twice
    /// keeps the last value.
    pub fn add_condition(
        &mut self,
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> FilterResult<&mut Self> {
        let field = field.into();
        if field.is_empty() {
            return Err(FilterError::EmptyField);
        }

        let value = value.into();
        if !operator.accepts(&value) {
            return Err(FilterError::InvalidValue {
                operator,
                expected: operator.expected_shape().unwrap_or("a value"),
            });
        }

        self.node.set_condition(field, operator, value)?;
        Ok(self)
    }

    /// Matches when the field is present
    pub fn exists(&mut self, field: impl Into<String>) -> FilterResult<&mut Self> {
        self.add_condition(field, Operator::Exists, true)
    }

    /// Matches when the field is absent
    pub fn not_exists(&mut self, field: impl Into<String>) -> FilterResult<&mut Self> {
        self.add_condition(field, Operator::Exists, false)
    }

    /// field == value
    pub fn equals(
        &mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> FilterResult<&mut Self> {
        self.add_condition(field, Operator::Eq, value)
    }

    /// field != value
    pub fn not_equals(
        &mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> FilterResult<&mut Self> {
        self.add_condition(field, Operator::Ne, value)
    }

    /// Matches when the field equals any of the values
    pub fn any_of<I, V>(&mut self, field: impl Into<String>, values: I) -> FilterResult<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.add_condition(field, Operator::In, values)
    }

    /// Matches when the field equals none of the values
    pub fn none_of<I, V>(&mut self, field: impl Into<String>, values: I) -> FilterResult<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.add_condition(field, Operator::Nin, values)
    }

    /// field > value
    pub fn greater_than(
        &mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> FilterResult<&mut Self> {
        self.add_condition(field, Operator::Gt, value)
    }

    /// field >= value
    pub fn greater_or_equals(
        &mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> FilterResult<&mut Self> {
        self.add_condition(field, Operator::Gte, value)
    }

    /// field < value
    pub fn less_than(
        &mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> FilterResult<&mut Self> {
        self.add_condition(field, Operator::Lt, value)
    }

    /// field <= value
    pub fn less_or_equals(
        &mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> FilterResult<&mut Self> {
        self.add_condition(field, Operator::Lte, value)
    }

    /// Matches string fields against a regular expression
    pub fn pattern_match(
        &mut self,
        field: impl Into<String>,
        pattern: impl Into<String>,
    ) -> FilterResult<&mut Self> {
        self.add_condition(field, Operator::Regex, pattern.into())
    }

    /// Matches documents whose geometry lies inside `region`.
    ///
    /// With `invert` set, matches documents whose geometry does not.
    pub fn geo_within(
        &mut self,
        field: impl Into<String>,
        region: &Geometry,
        invert: bool,
    ) -> FilterResult<&mut Self> {
        self.add_geo(field, Operator::GeoWithin, region, invert)
    }

    /// Matches documents whose geometry shares a point with `region`.
    ///
    /// With `invert` set, matches documents whose geometry does not.
    pub fn geo_intersects(
        &mut self,
        field: impl Into<String>,
        region: &Geometry,
        invert: bool,
    ) -> FilterResult<&mut Self> {
        self.add_geo(field, Operator::GeoIntersects, region, invert)
    }

    fn add_geo(
        &mut self,
        field: impl Into<String>,
        operator: Operator,
        region: &Geometry,
        invert: bool,
    ) -> FilterResult<&mut Self> {
        let operand = region.to_operand();
        if invert {
            let mut negated = Document::new();
            negated.insert(operator.symbol().to_string(), operand);
            self.add_condition(field, Operator::Not, negated)
        } else {
            self.add_condition(field, operator, operand)
        }
    }

    /// Combines with `other` using OR.
    ///
    /// Chained calls flatten into one `$or` list. Fails if either filter is
    /// empty, leaving both untouched.
    pub fn or_filter(&mut self, other: &Filter) -> FilterResult<&mut Self> {
        self.combine(Combinator::Or, other)
    }

    /// Combines with `other` using AND.
    ///
    /// Chained calls flatten into one `$and` list. Fails if either filter is
    /// empty, leaving both untouched.
    pub fn and_filter(&mut self, other: &Filter) -> FilterResult<&mut Self> {
        self.combine(Combinator::And, other)
    }

    fn combine(&mut self, combinator: Combinator, other: &Filter) -> FilterResult<&mut Self> {
        if self.is_empty() || other.is_empty() {
            return Err(FilterError::EmptyOperand { combinator });
        }
        self.node.combine(combinator, &other.node);
        Ok(self)
    }
}

impl From<FilterNode> for Filter {
    fn from(node: FilterNode) -> Self {
        Self { node }
    }
}

impl TryFrom<&Document> for Filter {
    type Error = FilterError;

    fn try_from(query: &Document) -> Result<Self, Self::Error> {
        Self::from_query(query)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let query = Value::Object(self.get_query());
        match serde_json::to_string_pretty(&query) {
            Ok(text) => f.write_str(&text),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.get_query().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let query = Document::deserialize(deserializer)?;
        Filter::from_query(&query).map_err(de::Error::custom)
    }
}
