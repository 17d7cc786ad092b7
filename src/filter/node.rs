//! Predicate tree
//!
//! A filter is either a leaf (field → operator constraints) or a composite
//! (one combinator over a list of nodes). The two forms never mix.

use serde_json::{Map, Value};

use super::errors::{FilterError, FilterResult};
use super::operator::{Combinator, Operator};
use crate::driver::Document;

/// Constraints on a single field path
#[derive(Debug, Clone, PartialEq)]
pub struct FieldConditions {
    /// Dot-separated field path
    pub field: String,
    /// Operator → value, in insertion order, one entry per operator
    pub conditions: Vec<(Operator, Value)>,
}

impl FieldConditions {
    fn new(field: String) -> Self {
        Self {
            field,
            conditions: Vec::new(),
        }
    }

    /// Sets the value for an operator, replacing any earlier value
    pub fn set(&mut self, operator: Operator, value: Value) {
        match self.conditions.iter_mut().find(|(op, _)| *op == operator) {
            Some(slot) => slot.1 = value,
            None => self.conditions.push((operator, value)),
        }
    }

    /// Returns the value stored for an operator
    pub fn get(&self, operator: Operator) -> Option<&Value> {
        self.conditions
            .iter()
            .find(|(op, _)| *op == operator)
            .map(|(_, value)| value)
    }
}

/// A node of the predicate tree
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    /// Field conditions, implicitly AND-ed
    Leaf(Vec<FieldConditions>),
    /// Boolean combination of nodes
    Composite(Combinator, Vec<FilterNode>),
}

impl Default for FilterNode {
    fn default() -> Self {
        FilterNode::Leaf(Vec::new())
    }
}

impl FilterNode {
    /// True for a leaf with no fields
    pub fn is_empty(&self) -> bool {
        matches!(self, FilterNode::Leaf(fields) if fields.is_empty())
    }

    /// True for an AND/OR node
    pub fn is_composite(&self) -> bool {
        matches!(self, FilterNode::Composite(..))
    }

    /// Stores `value` under `operator` for `field`
    pub(crate) fn set_condition(
        &mut self,
        field: String,
        operator: Operator,
        value: Value,
    ) -> FilterResult<()> {
        let FilterNode::Leaf(fields) = self else {
            return Err(FilterError::CompositeFilter);
        };

        let index = match fields.iter().position(|f| f.field == field) {
            Some(index) => index,
            None => {
                fields.push(FieldConditions::new(field));
                fields.len() - 1
            }
        };
        fields[index].set(operator, value);
        Ok(())
    }

    /// Combines `other` into this node under `combinator`
    ///
    /// Same-kind chains are flattened into one operand list.
    pub(crate) fn combine(&mut self, combinator: Combinator, other: &FilterNode) {
        match self {
            FilterNode::Composite(kind, operands) if *kind == combinator => {
                operands.push(other.clone());
            }
            node => {
                let previous = std::mem::take(node);
                *node = FilterNode::Composite(combinator, vec![previous, other.clone()]);
            }
        }
    }

    /// Compiles the node into a query document
    pub fn to_document(&self) -> Document {
        let mut doc = Map::new();
        match self {
            FilterNode::Leaf(fields) => {
                for field in fields {
                    let constraints: Map<String, Value> = field
                        .conditions
                        .iter()
                        .map(|(op, value)| (op.symbol().to_string(), value.clone()))
                        .collect();
                    doc.insert(field.field.clone(), Value::Object(constraints));
                }
            }
            FilterNode::Composite(combinator, operands) => {
                let operands = operands
                    .iter()
                    .map(|node| Value::Object(node.to_document()))
                    .collect();
                doc.insert(combinator.symbol().to_string(), Value::Array(operands));
            }
        }
        doc
    }

    /// Parses a query document produced by [`FilterNode::to_document`]
    pub fn from_document(doc: &Document) -> FilterResult<Self> {
        let combinators: Vec<_> = doc
            .keys()
            .filter_map(|key| Combinator::from_symbol(key))
            .collect();

        match combinators.as_slice() {
            [] => Self::parse_leaf(doc),
            [combinator] if doc.len() == 1 => {
                let operands = doc
                    .get(combinator.symbol())
                    .and_then(Value::as_array)
                    .ok_or_else(|| {
                        FilterError::MalformedQuery(format!("'{}' must hold an array", combinator))
                    })?;
                if operands.is_empty() {
                    return Err(FilterError::MalformedQuery(format!(
                        "'{}' needs at least one operand",
                        combinator
                    )));
                }
                let nodes = operands
                    .iter()
                    .map(|operand| match operand {
                        Value::Object(sub) => Self::from_document(sub),
                        other => Err(FilterError::MalformedQuery(format!(
                            "'{}' operand {} is not a document",
                            combinator, other
                        ))),
                    })
                    .collect::<FilterResult<Vec<_>>>()?;
                Ok(FilterNode::Composite(*combinator, nodes))
            }
            _ => Err(FilterError::MalformedQuery(
                "a combinator must be the only key of its document".to_string(),
            )),
        }
    }

    fn parse_leaf(doc: &Document) -> FilterResult<Self> {
        let mut node = FilterNode::default();
        for (field, constraints) in doc {
            if field.is_empty() {
                return Err(FilterError::EmptyField);
            }
            if field.starts_with('$') {
                return Err(FilterError::UnknownOperator(field.clone()));
            }
            let Value::Object(constraints) = constraints else {
                return Err(FilterError::MalformedQuery(format!(
                    "constraints for '{}' must be an operator document",
                    field
                )));
            };
            if constraints.is_empty() {
                return Err(FilterError::MalformedQuery(format!(
                    "constraints for '{}' must name at least one operator",
                    field
                )));
            }
            for (symbol, value) in constraints {
                let operator = Operator::from_symbol(symbol)
                    .ok_or_else(|| FilterError::UnknownOperator(symbol.clone()))?;
                if !operator.accepts(value) {
                    return Err(FilterError::InvalidValue {
                        operator,
                        expected: operator.expected_shape().unwrap_or("a value"),
                    });
                }
                node.set_condition(field.clone(), operator, value.clone())?;
            }
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(field: &str, op: Operator, value: Value) -> FilterNode {
        let mut node = FilterNode::default();
        node.set_condition(field.to_string(), op, value).unwrap();
        node
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_default_is_empty_leaf() {
        let node = FilterNode::default();
        assert!(node.is_empty());
        assert!(!node.is_composite());
        assert!(node.to_document().is_empty());
    }

    #[test]
    fn test_same_operator_overwrites() {
        let mut node = leaf("x", Operator::Gt, json!(1));
        node.set_condition("x".to_string(), Operator::Gt, json!(5)).unwrap();
        assert_eq!(node.to_document(), doc(json!({"x": {"$gt": 5}})));
    }

    #[test]
    fn test_different_operators_accumulate() {
        let mut node = leaf("x", Operator::Gt, json!(0));
        node.set_condition("x".to_string(), Operator::Lte, json!(100)).unwrap();
        assert_eq!(node.to_document(), doc(json!({"x": {"$gt": 0, "$lte": 100}})));
    }

    #[test]
    fn test_condition_on_composite_rejected() {
        let mut node = leaf("a", Operator::Eq, json!(1));
        node.combine(Combinator::Or, &leaf("b", Operator::Eq, json!(2)));
        let err = node
            .set_condition("c".to_string(), Operator::Eq, json!(3))
            .unwrap_err();
        assert_eq!(err, FilterError::CompositeFilter);
    }

    #[test]
    fn test_combine_flattens_same_kind() {
        let mut node = leaf("a", Operator::Eq, json!(1));
        node.combine(Combinator::And, &leaf("b", Operator::Eq, json!(2)));
        node.combine(Combinator::And, &leaf("c", Operator::Eq, json!(3)));
        match &node {
            FilterNode::Composite(Combinator::And, operands) => assert_eq!(operands.len(), 3),
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_combine_nests_different_kind() {
        let mut node = leaf("a", Operator::Eq, json!(1));
        node.combine(Combinator::Or, &leaf("b", Operator::Eq, json!(2)));
        node.combine(Combinator::And, &leaf("c", Operator::Eq, json!(3)));
        assert_eq!(
            node.to_document(),
            doc(json!({"$and": [
                {"$or": [{"a": {"$eq": 1}}, {"b": {"$eq": 2}}]},
                {"c": {"$eq": 3}}
            ]}))
        );
    }

    #[test]
    fn test_parse_round_trip() {
        let query = doc(json!({
            "$or": [
                {"x": {"$eq": 1}, "y": {"$gt": 0, "$lt": 9}},
                {"$and": [{"z": {"$in": [1, 2]}}, {"w": {"$exists": false}}]}
            ]
        }));
        let node = FilterNode::from_document(&query).unwrap();
        assert_eq!(node.to_document(), query);
    }

    #[test]
    fn test_parse_rejects_mixed_document() {
        let query = doc(json!({"$or": [{"a": {"$eq": 1}}], "b": {"$eq": 2}}));
        assert!(matches!(
            FilterNode::from_document(&query),
            Err(FilterError::MalformedQuery(_))
        ));
    }

    #[test]
    fn test_parse_rejects_bare_values() {
        let query = doc(json!({"a": 1}));
        assert!(matches!(
            FilterNode::from_document(&query),
            Err(FilterError::MalformedQuery(_))
        ));
    }

    #[test]
    fn test_parse_rejects_empty_constraints() {
        let query = doc(json!({"a": {}}));
        assert!(matches!(
            FilterNode::from_document(&query),
            Err(FilterError::MalformedQuery(_))
        ));

        let nested = doc(json!({"$or": [{"a": {"$eq": 1}}, {"b": {}}]}));
        assert!(FilterNode::from_document(&nested).is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_operator() {
        let query = doc(json!({"a": {"$near": [0, 0]}}));
        assert_eq!(
            FilterNode::from_document(&query),
            Err(FilterError::UnknownOperator("$near".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_empty_combinator() {
        let query = doc(json!({"$and": []}));
        assert!(FilterNode::from_document(&query).is_err());
    }

    #[test]
    fn test_parse_checks_value_shape() {
        let query = doc(json!({"a": {"$in": "abc"}}));
        assert!(matches!(
            FilterNode::from_document(&query),
            Err(FilterError::InvalidValue { operator: Operator::In, .. })
        ));
    }
}
