//! Audience predicates and the built-in structured condition language.
use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::{Attributes, Value};

/// Predicate gating whether an audience rule applies to an event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AudiencePredicate {
    /// Matches every event.
    #[default]
    Always,
    /// Built-in structured conditions, all of which must hold.
    Conditions(Rule),
    /// An expression in a named language, evaluated by a registered runtime.
    Expression { language: String, expression: String },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub conditions: Vec<Condition>,
}

impl Rule {
    pub fn new(conditions: Vec<Condition>) -> Rule {
        Rule { conditions }
    }

    pub fn eval(&self, attributes: &Attributes) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.eval(attributes))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub operator: Operator,
    /// Attribute name or dotted path into nested maps.
    pub attribute: String,
    pub value: Value,
}

impl Condition {
    pub fn new(attribute: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Condition {
            operator,
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn eval(&self, attributes: &Attributes) -> bool {
        self.operator
            .eval(Value::get_path(attributes, &self.attribute), &self.value)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Eq,
    NotEq,
    Matches,
    NotMatches,
    Gte,
    Gt,
    Lte,
    Lt,
    OneOf,
    NotOneOf,
    IsNull,
}

impl Operator {
    /// Applying `Operator` to the values. Returns `false` if the operator cannot be applied or
    /// there's a misconfiguration.
    pub fn eval(&self, attribute: Option<&Value>, condition_value: &Value) -> bool {
        self.try_eval(attribute, condition_value).unwrap_or(false)
    }

    /// Try applying `Operator` to the values, returning `None` if the operator cannot be applied.
    fn try_eval(&self, attribute: Option<&Value>, condition_value: &Value) -> Option<bool> {
        match self {
            Self::Eq | Self::NotEq => {
                let equal = values_equal(attribute?, condition_value);
                Some(if *self == Self::Eq { equal } else { !equal })
            }

            Self::Matches | Self::NotMatches => {
                let s = attribute?.as_str()?;
                let regex = Regex::new(condition_value.as_str()?).ok()?;
                let matches = regex.is_match(s);
                Some(if *self == Self::Matches {
                    matches
                } else {
                    !matches
                })
            }

            Self::OneOf | Self::NotOneOf => {
                let s = attribute?.to_scalar_string()?;
                let values = condition_value.as_list()?;
                let is_one_of = values
                    .iter()
                    .any(|v| v.to_scalar_string().is_some_and(|v| v == s));
                Some(if *self == Self::OneOf {
                    is_one_of
                } else {
                    !is_one_of
                })
            }

            Self::IsNull => {
                let is_null = attribute.map_or(true, Value::is_null);
                match condition_value {
                    Value::Bool(true) => Some(is_null),
                    Value::Bool(false) => Some(!is_null),
                    _ => None,
                }
            }

            Self::Gte | Self::Gt | Self::Lte | Self::Lt => {
                let condition_version = condition_value
                    .as_str()
                    .and_then(|s| Version::parse(s).ok());

                if let Some(condition_version) = condition_version {
                    // semver comparison
                    let attribute_version = Version::parse(attribute?.as_str()?).ok()?;
                    Some(self.compare(&attribute_version, &condition_version))
                } else {
                    // numeric comparison
                    let condition_value = to_number(condition_value)?;
                    let attribute_value = to_number(attribute?)?;
                    Some(self.compare(&attribute_value, &condition_value))
                }
            }
        }
    }

    fn compare<T: PartialOrd>(&self, attribute: &T, condition: &T) -> bool {
        match self {
            Self::Gt => attribute > condition,
            Self::Gte => attribute >= condition,
            Self::Lt => attribute < condition,
            Self::Lte => attribute <= condition,
            // only ordering operators reach here
            _ => false,
        }
    }
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.parse().ok(),
        v => v.as_f64(),
    }
}

fn values_equal(attribute: &Value, condition: &Value) -> bool {
    if let (Some(a), Some(c)) = (attribute.as_f64(), condition.as_f64()) {
        return a == c;
    }
    match (attribute.to_scalar_string(), condition.to_scalar_string()) {
        (Some(a), Some(c)) => a == c,
        _ => attribute == condition,
    }
}
