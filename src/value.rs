use std::collections::HashMap;

use derive_more::From;
use serde::{Deserialize, Serialize};

/// Type alias for a HashMap representing key-value pairs of event attributes.
///
/// # Examples
/// ```
/// # use paywall_core::{Attributes, Value};
/// let attributes = [
///     ("plan".to_owned(), "pro".into()),
///     ("sessions".to_owned(), 12i64.into()),
///     ("is_trial".to_owned(), true.into()),
/// ].into_iter().collect::<Attributes>();
/// ```
pub type Attributes = HashMap<String, Value>;

/// Tagged representation of arbitrary attribute data fed into audience predicates.
///
/// Conveniently implements `From` conversions for the common primitive types.
///
/// ```
/// # use paywall_core::Value;
/// let string_value: Value = "pro".into();
/// let int_value: Value = 42i64.into();
/// let float_value: Value = 4.2.into();
/// let bool_value: Value = true.into();
/// ```
#[derive(Debug, Serialize, Deserialize, PartialEq, From, Clone, Default)]
#[serde(untagged)]
pub enum Value {
    /// A null value or absence of value.
    #[default]
    Null,
    /// A boolean value.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// An unsigned integer that does not fit into `i64`.
    UInt(u64),
    /// A floating-point number.
    Float(f64),
    /// A string value.
    String(String),
    /// An ordered list of values.
    List(Vec<Value>),
    /// A nested map of values.
    Map(HashMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        if let Value::String(s) = self {
            Some(s.as_str())
        } else {
            None
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Bool(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    /// Numeric view of the value. Integers are widened to `f64`.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::UInt(u) => Some(*u as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        if let Value::List(values) = self {
            Some(values)
        } else {
            None
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Resolve a dotted `path` (e.g., `user.plan`) against nested maps.
    ///
    /// An exact key match on the map takes priority over path splitting, so attributes whose
    /// names contain dots remain addressable.
    pub fn get_path<'a>(map: &'a HashMap<String, Value>, path: &str) -> Option<&'a Value> {
        if let Some(value) = map.get(path) {
            return Some(value);
        }
        let (head, rest) = path.split_once('.')?;
        match map.get(head)? {
            Value::Map(nested) => Value::get_path(nested, rest),
            _ => None,
        }
    }

    /// String form used by set-membership operators. Lists and maps have no scalar form.
    pub(crate) fn to_scalar_string(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::UInt(u) => Some(u.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::List(_) | Value::Map(_) => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}
