//! Node filters
//!
//! Compiles declarative filter expressions of the form
//! `[operator, property, ...values]` into node predicates used to restrict
//! spatial edge candidates.
//!
//! | Operator | Meaning |
//! |---|---|
//! | `==`, `!=` | Strict equality; an undefined property equals nothing |
//! | `>`, `>=`, `<`, `<=` | Ordering of same-typed numbers or strings |
//! | `in`, `!in` | Hash set membership over the remaining operands |
//! | `all` | Conjunction of nested expressions, `true` when empty |
//!
//! Unrecognized input compiles to a predicate that accepts every node.

mod expression;
mod value;

pub use expression::{ComparisonOperator, FilterExpression};
pub use value::{FilterProperty, FilterValue};

use crate::entity::Node;
use serde_json::Value;
use std::sync::Arc;

/// Compiled node predicate.
pub type FilterFunction = Arc<dyn Fn(&Node) -> bool + Send + Sync>;

/// Compiles filter expressions into predicates.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterCreator;

impl FilterCreator {
    pub fn new() -> Self {
        Self
    }

    /// Parses `expression` once and returns the predicate evaluating it.
    pub fn create_filter(&self, expression: &Value) -> FilterFunction {
        let parsed = FilterExpression::parse(expression);
        Arc::new(move |node: &Node| parsed.evaluate(node))
    }
}

/// Predicate accepting every node.
pub fn accept_all() -> FilterFunction {
    Arc::new(|_: &Node| true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{core_record, fill_record};
    use crate::api::FullNodeRecord;
    use serde_json::json;

    fn node_captured_at(captured_at: i64) -> Node {
        Node::from_full(FullNodeRecord {
            core: core_record(&format!("n{captured_at}"), 0.0, 0.0, "s1"),
            fill: fill_record(captured_at),
        })
    }

    fn core_node() -> Node {
        Node::new(core_record("core", 0.0, 0.0, "s1"))
    }

    #[test]
    fn test_equal_captured_at() {
        let filter = FilterCreator::new().create_filter(&json!(["==", "capturedAt", 1]));
        assert!(filter(&node_captured_at(1)));
        assert!(!filter(&node_captured_at(2)));
        assert!(!filter(&core_node()), "undefined property never matches");
    }

    #[test]
    fn test_not_equal_matches_undefined() {
        let filter = FilterCreator::new().create_filter(&json!(["!=", "capturedAt", 1]));
        assert!(!filter(&node_captured_at(1)));
        assert!(filter(&node_captured_at(2)));
        assert!(filter(&core_node()));
    }

    #[test]
    fn test_ordering_operators() {
        let creator = FilterCreator::new();
        let greater = creator.create_filter(&json!([">", "capturedAt", 1]));
        let at_most = creator.create_filter(&json!(["<=", "capturedAt", 1]));

        assert!(greater(&node_captured_at(2)));
        assert!(!greater(&node_captured_at(1)));
        assert!(at_most(&node_captured_at(1)));
        assert!(!at_most(&node_captured_at(2)));
        assert!(!greater(&core_node()));
        assert!(!at_most(&core_node()));
    }

    #[test]
    fn test_in_and_not_in() {
        let creator = FilterCreator::new();
        let included = creator.create_filter(&json!(["in", "capturedAt", 0, 1]));
        let excluded = creator.create_filter(&json!(["!in", "capturedAt", 0, 1]));

        for (captured_at, expected) in [(0, true), (1, true), (2, false)] {
            assert_eq!(included(&node_captured_at(captured_at)), expected);
            assert_eq!(excluded(&node_captured_at(captured_at)), !expected);
        }
    }

    #[test]
    fn test_all_without_operands_is_true() {
        let filter = FilterCreator::new().create_filter(&json!(["all"]));
        assert!(filter(&node_captured_at(5)));
        assert!(filter(&core_node()));
    }

    #[test]
    fn test_all_is_conjunction() {
        let filter = FilterCreator::new().create_filter(&json!([
            "all",
            ["==", "sequenceKey", "s1"],
            [">=", "capturedAt", 3]
        ]));
        assert!(filter(&node_captured_at(3)));
        assert!(!filter(&node_captured_at(2)));
    }

    #[test]
    fn test_unrecognized_fails_open() {
        let creator = FilterCreator::new();
        for expression in [json!(null), json!("=="), json!(["bogus", "key", 1]), json!({})] {
            let filter = creator.create_filter(&expression);
            assert!(filter(&node_captured_at(1)), "{expression} should accept");
        }
    }

    #[test]
    fn test_string_properties() {
        let creator = FilterCreator::new();
        let by_user = creator.create_filter(&json!(["==", "username", "tester"]));
        let by_key = creator.create_filter(&json!(["in", "key", "n1", "n2"]));
        assert!(by_user(&node_captured_at(1)));
        assert!(by_key(&node_captured_at(1)));
        assert!(!by_key(&node_captured_at(3)));
    }

    #[test]
    fn test_large_membership_list() {
        let mut expression = vec![json!("in"), json!("capturedAt")];
        expression.extend((0..2000).map(|i| json!(i)));
        let filter = FilterCreator::new().create_filter(&Value::Array(expression));

        let results: Vec<bool> = [0, 1, 1999, 2000]
            .into_iter()
            .map(|t| filter(&node_captured_at(t)))
            .collect();
        assert_eq!(results, vec![true, true, true, false]);
    }
}
