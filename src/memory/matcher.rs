//! Evaluates compiled query documents against documents
//!
//! Comparison rules:
//! - Numbers compare with numbers, strings with strings; no coercion
//! - Dotted paths descend objects and fan out over arrays
//! - A missing field equals `null`
//! - An array field matches if the array or any element matches

use std::cmp::Ordering;
use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;

use super::geometry::{self, Shape};
use crate::driver::{Document, DriverError, DriverResult, BAD_VALUE};
use crate::filter::{Combinator, Filter, FilterNode, Operator};

/// A parsed query, ready to test documents
#[derive(Debug)]
pub struct Matcher {
    node: FilterNode,
    /// Compiled `$regex` operands, keyed by pattern
    patterns: HashMap<String, Regex>,
}

impl Matcher {
    /// Parses a query document; malformed queries fail with `BAD_VALUE`
    pub fn compile(query: &Document) -> DriverResult<Self> {
        let filter = Filter::from_query(query)
            .map_err(|err| DriverError::operation(BAD_VALUE, err.to_string()))?;

        let mut matcher = Self {
            node: filter.node().clone(),
            patterns: HashMap::new(),
        };
        let node = matcher.node.clone();
        matcher.prepare(&node)?;
        Ok(matcher)
    }

    /// Checks if a document satisfies the query
    pub fn matches(&self, doc: &Document) -> bool {
        self.matches_node(&self.node, doc)
    }

    fn prepare(&mut self, node: &FilterNode) -> DriverResult<()> {
        match node {
            FilterNode::Leaf(fields) => {
                for field in fields {
                    for (op, operand) in &field.conditions {
                        self.prepare_operator(*op, operand)?;
                    }
                }
            }
            FilterNode::Composite(_, operands) => {
                for operand in operands {
                    self.prepare(operand)?;
                }
            }
        }
        Ok(())
    }

    fn prepare_operator(&mut self, op: Operator, operand: &Value) -> DriverResult<()> {
        match op {
            Operator::Regex => {
                let pattern = operand.as_str().unwrap_or_default();
                if !self.patterns.contains_key(pattern) {
                    let regex = Regex::new(pattern).map_err(|err| {
                        DriverError::operation(BAD_VALUE, format!("invalid $regex: {}", err))
                    })?;
                    self.patterns.insert(pattern.to_string(), regex);
                }
            }
            Operator::GeoWithin | Operator::GeoIntersects => {
                if Shape::from_operand(operand).is_none() {
                    return Err(DriverError::operation(
                        BAD_VALUE,
                        format!("{} needs a $geometry operand", op),
                    ));
                }
            }
            Operator::Not => {
                for (symbol, inner) in operand.as_object().into_iter().flatten() {
                    let inner_op = Operator::from_symbol(symbol).ok_or_else(|| {
                        DriverError::operation(BAD_VALUE, format!("unknown operator in $not: {}", symbol))
                    })?;
                    self.prepare_operator(inner_op, inner)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn matches_node(&self, node: &FilterNode, doc: &Document) -> bool {
        match node {
            FilterNode::Leaf(fields) => fields.iter().all(|field| {
                let values = resolve_path(doc, &field.field);
                field
                    .conditions
                    .iter()
                    .all(|(op, operand)| self.matches_operator(*op, operand, &values))
            }),
            FilterNode::Composite(Combinator::And, operands) => {
                operands.iter().all(|n| self.matches_node(n, doc))
            }
            FilterNode::Composite(Combinator::Or, operands) => {
                operands.iter().any(|n| self.matches_node(n, doc))
            }
        }
    }

    fn matches_operator(&self, op: Operator, operand: &Value, values: &[&Value]) -> bool {
        match op {
            Operator::Eq => eq_match(values, operand),
            Operator::Ne => !eq_match(values, operand),
            Operator::In => in_match(values, operand),
            Operator::Nin => !in_match(values, operand),
            Operator::Gt => cmp_match(values, operand, |o| o == Ordering::Greater),
            Operator::Gte => cmp_match(values, operand, |o| o != Ordering::Less),
            Operator::Lt => cmp_match(values, operand, |o| o == Ordering::Less),
            Operator::Lte => cmp_match(values, operand, |o| o != Ordering::Greater),
            Operator::Exists => operand.as_bool() == Some(!values.is_empty()),
            Operator::Regex => {
                let Some(regex) = operand.as_str().and_then(|p| self.patterns.get(p)) else {
                    return false;
                };
                candidates(values).any(|v| v.as_str().is_some_and(|s| regex.is_match(s)))
            }
            Operator::GeoWithin => geo_match(values, operand, geometry::within),
            Operator::GeoIntersects => geo_match(values, operand, geometry::intersects),
            Operator::Not => {
                let Some(inner) = operand.as_object() else {
                    return false;
                };
                !inner.iter().all(|(symbol, inner_operand)| {
                    Operator::from_symbol(symbol)
                        .is_some_and(|inner_op| self.matches_operator(inner_op, inner_operand, values))
                })
            }
        }
    }
}

/// Collects every value reachable through a dotted path
pub(crate) fn resolve_path<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let mut segments = path.split('.');
    let mut current: Vec<&Value> = segments
        .next()
        .and_then(|first| doc.get(first))
        .into_iter()
        .collect();

    for segment in segments {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => next.extend(map.get(segment)),
                Value::Array(items) => {
                    if let Ok(index) = segment.parse::<usize>() {
                        next.extend(items.get(index));
                    }
                    for item in items {
                        if let Value::Object(map) = item {
                            next.extend(map.get(segment));
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }
    current
}

/// Values plus the elements of any array values
fn candidates<'a>(values: &'a [&'a Value]) -> impl Iterator<Item = &'a Value> + 'a {
    values.iter().flat_map(|v| {
        let elements = v.as_array().map(|items| items.iter()).into_iter().flatten();
        std::iter::once(*v).chain(elements)
    })
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

fn eq_match(values: &[&Value], operand: &Value) -> bool {
    if values.is_empty() {
        return operand.is_null();
    }
    candidates(values).any(|v| values_equal(v, operand))
}

fn in_match(values: &[&Value], operand: &Value) -> bool {
    operand
        .as_array()
        .is_some_and(|choices| choices.iter().any(|choice| eq_match(values, choice)))
}

fn cmp_match(values: &[&Value], operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    candidates(values).any(|v| compare_values(v, operand).is_some_and(&accept))
}

/// Orders two values of the same kind; None across kinds
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(ai), Some(bi)) = (a.as_i64(), b.as_i64()) {
                return Some(ai.cmp(&bi));
            }
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn geo_match(values: &[&Value], operand: &Value, test: fn(&Shape, &Shape) -> bool) -> bool {
    let Some(region) = Shape::from_operand(operand) else {
        return false;
    };
    values
        .iter()
        .filter_map(|v| Shape::from_value(v))
        .any(|shape| test(&shape, &region))
}
