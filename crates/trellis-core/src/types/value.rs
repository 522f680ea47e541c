//! Attribute values.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

/// A value stored under an attribute.
///
/// Serialized untagged, so JSON documents read naturally. Timestamps
/// serialize as ISO 8601 strings, and any string in that form reads back
/// as `Value::DateTime`.
///
/// Comparison is partial: values of the same variant compare naturally,
/// integers and floats compare numerically, everything else is unordered.
/// Equality follows the same rules, so `Int(1) == Float(1.0)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    // Untagged variants are tried in declaration order.
    DateTime(NaiveDateTime),
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Duration(Duration),
    Null,
}

impl Value {
    /// Whether this is the explicit null value.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Short name of the variant, used in logs and error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::DateTime(_) => "datetime",
            Self::Duration(_) => "duration",
            Self::Null => "null",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            (Self::Duration(a), Self::Duration(b)) => Some(a.cmp(b)),
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::DateTime(t) => write!(f, "{t}"),
            Self::Duration(d) => write!(f, "{d:?}"),
            Self::Null => f.write_str("null"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<Duration> for Value {
    fn from(value: Duration) -> Self {
        Self::Duration(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn numeric_values_compare_across_variants() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert!(Value::Int(2) > Value::Float(1.5));
        assert!(Value::Float(0.5) < Value::Int(1));
    }

    #[test]
    fn mismatched_variants_are_unordered() {
        assert_eq!(Value::from("1").partial_cmp(&Value::Int(1)), None);
        assert_ne!(Value::Null, Value::Bool(false));
        assert_eq!(Value::Null, Value::Null);
    }

    #[test]
    fn timestamps_and_durations_order() {
        let earlier = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("date");
        let later = NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("date");
        assert!(Value::from(earlier) < Value::from(later));
        assert!(Value::from(Duration::from_secs(1)) < Value::from(Duration::from_secs(2)));
    }

    #[test]
    fn timestamps_survive_json() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(8, 30, 0))
            .expect("date");
        let text = serde_json::to_string(&Value::from(at)).expect("serialize");
        assert_eq!(text, "\"2024-03-09T08:30:00\"");
        let back: Value = serde_json::from_str(&text).expect("deserialize");
        assert!(matches!(back, Value::DateTime(t) if t == at));

        let plain: Value = serde_json::from_str("\"ward a\"").expect("deserialize");
        assert_eq!(plain.as_str(), Some("ward a"));
    }

    #[test]
    fn option_maps_none_to_null() {
        assert!(Value::from(None::<i64>).is_null());
        assert_eq!(Value::from(Some(3)), Value::Int(3));
    }
}
