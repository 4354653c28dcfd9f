//! Filter expression tree and its evaluation.

use super::value::{FilterProperty, FilterValue, SetKey};
use crate::entity::Node;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Binary comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl ComparisonOperator {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "==" => Some(ComparisonOperator::Equal),
            "!=" => Some(ComparisonOperator::NotEqual),
            ">" => Some(ComparisonOperator::Greater),
            ">=" => Some(ComparisonOperator::GreaterOrEqual),
            "<" => Some(ComparisonOperator::Less),
            "<=" => Some(ComparisonOperator::LessOrEqual),
            _ => None,
        }
    }
}

/// Parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    /// Matches every node
    Always,
    Comparison {
        op: ComparisonOperator,
        property: FilterProperty,
        value: FilterValue,
    },
    /// `in` when `included`, `!in` otherwise
    Membership {
        included: bool,
        property: FilterProperty,
        values: HashSet<SetKey>,
    },
    All(Vec<FilterExpression>),
}

impl FilterExpression {
    /// Parses a JSON filter array such as `["==", "capturedAt", 1]`.
    ///
    /// Anything that is not a recognizable expression parses to
    /// [`FilterExpression::Always`].
    pub fn parse(value: &Value) -> Self {
        let Some(items) = value.as_array() else {
            return FilterExpression::Always;
        };
        let Some(op) = items.first().and_then(Value::as_str) else {
            return FilterExpression::Always;
        };

        if op == "all" {
            return FilterExpression::All(items[1..].iter().map(Self::parse).collect());
        }

        let Some(property) = items.get(1).and_then(Value::as_str).map(FilterProperty::parse)
        else {
            return FilterExpression::Always;
        };

        if op == "in" || op == "!in" {
            let values = items[2..]
                .iter()
                .filter_map(FilterValue::from_json)
                .filter_map(|v| v.set_key())
                .collect();
            return FilterExpression::Membership {
                included: op == "in",
                property,
                values,
            };
        }

        match (
            ComparisonOperator::parse(op),
            items.get(2).and_then(FilterValue::from_json),
        ) {
            (Some(op), Some(value)) => FilterExpression::Comparison {
                op,
                property,
                value,
            },
            _ => FilterExpression::Always,
        }
    }

    /// Evaluates the expression against a node.
    pub fn evaluate(&self, node: &Node) -> bool {
        match self {
            FilterExpression::Always => true,
            FilterExpression::Comparison {
                op,
                property,
                value,
            } => compare(*op, property.read(node), value),
            FilterExpression::Membership {
                included,
                property,
                values,
            } => {
                let found = property
                    .read(node)
                    .and_then(|v| v.set_key())
                    .is_some_and(|key| values.contains(&key));
                found == *included
            }
            FilterExpression::All(children) => children.iter().all(|c| c.evaluate(node)),
        }
    }
}

fn compare(op: ComparisonOperator, lhs: Option<FilterValue>, rhs: &FilterValue) -> bool {
    let equal = lhs.as_ref().is_some_and(|l| strict_equal(l, rhs));
    match op {
        ComparisonOperator::Equal => equal,
        ComparisonOperator::NotEqual => !equal,
        ordering_op => {
            let Some(ordering) = lhs.as_ref().and_then(|l| l.ordering(rhs)) else {
                return false;
            };
            match ordering_op {
                ComparisonOperator::Greater => ordering == Ordering::Greater,
                ComparisonOperator::GreaterOrEqual => ordering != Ordering::Less,
                ComparisonOperator::Less => ordering == Ordering::Less,
                ComparisonOperator::LessOrEqual => ordering != Ordering::Greater,
                ComparisonOperator::Equal | ComparisonOperator::NotEqual => false,
            }
        }
    }
}

fn strict_equal(lhs: &FilterValue, rhs: &FilterValue) -> bool {
    match (lhs, rhs) {
        (FilterValue::Null, FilterValue::Null) => true,
        (FilterValue::Bool(a), FilterValue::Bool(b)) => a == b,
        (FilterValue::Number(a), FilterValue::Number(b)) => a == b,
        (FilterValue::String(a), FilterValue::String(b)) => a == b,
        _ => false,
    }
}
