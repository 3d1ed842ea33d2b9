//! Attribute and value predicate types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::default_true;

/// String matching mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetQueryMatch {
    #[default]
    Exact,
    Begin,
    End,
    Contains,
}

/// Comparison operator for number and datetime predicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetQueryOperator {
    #[default]
    Equals,
    GreaterThan,
    GreaterEquals,
    LessThan,
    LessEquals,
    Between,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringPredicate {
    #[serde(default, rename = "match")]
    pub match_mode: AssetQueryMatch,
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub negate: bool,
}

impl StringPredicate {
    pub fn exact(value: impl Into<String>) -> Self {
        Self {
            match_mode: AssetQueryMatch::Exact,
            case_sensitive: true,
            value: Some(value.into()),
            negate: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberPredicate {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub range_value: Option<f64>,
    #[serde(default)]
    pub operator: AssetQueryOperator,
    #[serde(default)]
    pub negate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanPredicate {
    #[serde(default)]
    pub value: bool,
}

/// Datetime comparison; operands are RFC 3339 strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimePredicate {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub range_value: Option<String>,
    #[serde(default)]
    pub operator: AssetQueryOperator,
    #[serde(default)]
    pub negate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayPredicate {
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub length_equals: Option<usize>,
    #[serde(default)]
    pub length_greater_than: Option<usize>,
    #[serde(default)]
    pub length_less_than: Option<usize>,
    #[serde(default)]
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueEmptyPredicate {
    #[serde(default)]
    pub negate: bool,
}

/// A predicate over a single attribute value, discriminated by `predicateType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "predicateType", rename_all = "kebab-case")]
pub enum ValuePredicate {
    String(StringPredicate),
    Number(NumberPredicate),
    Boolean(BooleanPredicate),
    #[serde(rename = "datetime")]
    DateTime(DateTimePredicate),
    Array(ArrayPredicate),
    ValueAny {},
    ValueEmpty(ValueEmptyPredicate),
}

impl ValuePredicate {
    pub fn number(operator: AssetQueryOperator, value: f64) -> Self {
        ValuePredicate::Number(NumberPredicate {
            value: Some(value),
            range_value: None,
            operator,
            negate: false,
        })
    }

    pub fn string(value: impl Into<String>) -> Self {
        ValuePredicate::String(StringPredicate::exact(value))
    }

    pub fn boolean(value: bool) -> Self {
        ValuePredicate::Boolean(BooleanPredicate { value })
    }

    /// Discriminator string as written in rule JSON.
    pub fn type_name(&self) -> &'static str {
        match self {
            ValuePredicate::String(_) => "string",
            ValuePredicate::Number(_) => "number",
            ValuePredicate::Boolean(_) => "boolean",
            ValuePredicate::DateTime(_) => "datetime",
            ValuePredicate::Array(_) => "array",
            ValuePredicate::ValueAny {} => "value-any",
            ValuePredicate::ValueEmpty(_) => "value-empty",
        }
    }
}

/// Path into an object or array attribute value (string keys, integer indexes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuePath {
    #[serde(default)]
    pub paths: Vec<Value>,
}

/// Predicate over one attribute of an asset: its name, value and previous value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributePredicate {
    #[serde(default)]
    pub name: Option<StringPredicate>,
    #[serde(default)]
    pub value: Option<ValuePredicate>,
    /// Inverts the value match; the name must still match.
    #[serde(default)]
    pub negated: bool,
    #[serde(default)]
    pub path: Option<ValuePath>,
    #[serde(default)]
    pub previous_value: Option<ValuePredicate>,
}

impl AttributePredicate {
    pub fn new(attribute_name: impl Into<String>, value: ValuePredicate) -> Self {
        Self {
            name: Some(StringPredicate::exact(attribute_name)),
            value: Some(value),
            ..Default::default()
        }
    }
}
