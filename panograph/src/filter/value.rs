//! Scalar values filters compare node properties against.

use crate::entity::Node;
use serde_json::Value;
use std::cmp::Ordering;

/// A scalar filter operand.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl FilterValue {
    /// Converts a JSON scalar. Arrays and objects are not filter values.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(FilterValue::Null),
            Value::Bool(b) => Some(FilterValue::Bool(*b)),
            Value::Number(n) => n.as_f64().map(FilterValue::Number),
            Value::String(s) => Some(FilterValue::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Ordering between two values of the same non-null type.
    pub(crate) fn ordering(&self, other: &FilterValue) -> Option<Ordering> {
        match (self, other) {
            (FilterValue::Number(a), FilterValue::Number(b)) => a.partial_cmp(b),
            (FilterValue::String(a), FilterValue::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Hashable form used for membership sets. NaN has none since it never
    /// equals anything.
    pub(crate) fn set_key(&self) -> Option<SetKey> {
        match self {
            FilterValue::Null => Some(SetKey::Null),
            FilterValue::Bool(b) => Some(SetKey::Bool(*b)),
            FilterValue::Number(n) if n.is_nan() => None,
            // -0.0 and 0.0 are equal
            FilterValue::Number(n) => Some(SetKey::Number((n + 0.0).to_bits())),
            FilterValue::String(s) => Some(SetKey::String(s.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum SetKey {
    Null,
    Bool(bool),
    Number(u64),
    String(String),
}

/// Node attribute a filter expression refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterProperty {
    SequenceKey,
    CapturedAt,
    UserKey,
    Username,
    ProjectKey,
    Key,
    Pano,
    FullPano,
    Orientation,
    Private,
    CompassAngle,
    /// Any other name; never defined on a node
    Unknown(String),
}

impl FilterProperty {
    pub fn parse(name: &str) -> Self {
        match name {
            "sequenceKey" => FilterProperty::SequenceKey,
            "capturedAt" => FilterProperty::CapturedAt,
            "userKey" => FilterProperty::UserKey,
            "username" => FilterProperty::Username,
            "projectKey" => FilterProperty::ProjectKey,
            "key" => FilterProperty::Key,
            "pano" => FilterProperty::Pano,
            "fullPano" => FilterProperty::FullPano,
            "orientation" => FilterProperty::Orientation,
            "private" => FilterProperty::Private,
            "ca" => FilterProperty::CompassAngle,
            other => FilterProperty::Unknown(other.to_string()),
        }
    }

    /// Reads the property from a node.
    ///
    /// Returns `None` (undefined) when the node lacks the attribute, e.g.
    /// fill attributes of a core node or any attribute of a disposed node.
    pub fn read(&self, node: &Node) -> Option<FilterValue> {
        let string_or_null =
            |value: Option<String>| Some(value.map_or(FilterValue::Null, FilterValue::String));
        match self {
            FilterProperty::Key => Some(FilterValue::String(node.key().to_string())),
            FilterProperty::SequenceKey => node.sequence_key().ok().and_then(string_or_null),
            FilterProperty::CapturedAt => node
                .captured_at()
                .ok()
                .map(|t| FilterValue::Number(t as f64)),
            FilterProperty::UserKey => node.user_key().ok().map(FilterValue::String),
            FilterProperty::Username => node.username().ok().map(FilterValue::String),
            FilterProperty::ProjectKey => node.project_key().ok().and_then(string_or_null),
            FilterProperty::Pano => node.pano().ok().map(FilterValue::Bool),
            FilterProperty::FullPano => node.full_pano().ok().map(FilterValue::Bool),
            FilterProperty::Orientation => node
                .orientation()
                .ok()
                .map(|o| FilterValue::Number(f64::from(o))),
            FilterProperty::Private => node.private().ok().map(FilterValue::Bool),
            FilterProperty::CompassAngle => node
                .compass_angle()
                .ok()
                .map(|ca| ca.map_or(FilterValue::Null, FilterValue::Number)),
            FilterProperty::Unknown(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(FilterValue::from_json(&json!(null)), Some(FilterValue::Null));
        assert_eq!(FilterValue::from_json(&json!(1)), Some(FilterValue::Number(1.0)));
        assert_eq!(
            FilterValue::from_json(&json!("a")),
            Some(FilterValue::String("a".to_string()))
        );
        assert_eq!(FilterValue::from_json(&json!([1])), None);
    }

    #[test]
    fn test_ordering_requires_same_type() {
        let one = FilterValue::Number(1.0);
        let text = FilterValue::String("1".to_string());
        assert_eq!(one.ordering(&FilterValue::Number(2.0)), Some(Ordering::Less));
        assert_eq!(one.ordering(&text), None);
        assert_eq!(FilterValue::Null.ordering(&FilterValue::Null), None);
    }

    #[test]
    fn test_negative_zero_set_key() {
        assert_eq!(
            FilterValue::Number(-0.0).set_key(),
            FilterValue::Number(0.0).set_key()
        );
        assert_eq!(FilterValue::Number(f64::NAN).set_key(), None);
    }
}
