//! Value and attribute predicate matching.
//!
//! Every matcher is pure. A predicate that cannot be applied to a runtime
//! value returns [`EvaluationError`]; callers treat that as non-matching.

use assetflow_core::AssetState;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::debug;

use crate::error::EvaluationError;
use crate::schema::{
    ArrayPredicate, AssetQueryMatch, AssetQueryOperator, AttributePredicate, DateTimePredicate,
    NumberPredicate, StringPredicate, ValuePath, ValuePredicate,
};

// ── String ──────────────────────────────────────────────────────────

/// Match a string against a [`StringPredicate`], honouring `negate`.
///
/// A predicate without a value never matches (before negation).
pub fn string_matches(pred: &StringPredicate, candidate: &str) -> bool {
    let Some(expected) = pred.value.as_deref() else {
        return pred.negate;
    };
    let (candidate, expected) = if pred.case_sensitive {
        (candidate.to_string(), expected.to_string())
    } else {
        (candidate.to_lowercase(), expected.to_lowercase())
    };
    let hit = match pred.match_mode {
        AssetQueryMatch::Exact => candidate == expected,
        AssetQueryMatch::Begin => candidate.starts_with(&expected),
        AssetQueryMatch::End => candidate.ends_with(&expected),
        AssetQueryMatch::Contains => candidate.contains(&expected),
    };
    hit != pred.negate
}

// ── Value predicates ────────────────────────────────────────────────

/// JSON type name used in mismatch errors.
fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Match an optional attribute value against a [`ValuePredicate`].
///
/// A missing (or null) value fails every typed predicate before negation;
/// `value-any` always matches and `value-empty` matches it.
pub fn value_matches(
    pred: &ValuePredicate,
    value: Option<&Value>,
) -> Result<bool, EvaluationError> {
    let value = value.filter(|v| !v.is_null());
    match pred {
        ValuePredicate::ValueAny {} => Ok(true),
        ValuePredicate::ValueEmpty(p) => {
            let empty = match value {
                None => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(_) => false,
            };
            Ok(empty != p.negate)
        }
        ValuePredicate::String(p) => match value {
            None => Ok(p.negate),
            Some(Value::String(s)) => Ok(string_matches(p, s)),
            Some(other) => Err(mismatch("string", other)),
        },
        ValuePredicate::Number(p) => match value {
            None => Ok(p.negate),
            Some(Value::Number(n)) => {
                let n = n.as_f64().ok_or_else(|| EvaluationError::InvalidOperand {
                    predicate: "number",
                    reason: format!("{n} is not representable as f64"),
                })?;
                number_matches(p, n)
            }
            Some(other) => Err(mismatch("number", other)),
        },
        ValuePredicate::Boolean(p) => match value {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(*b == p.value),
            Some(other) => Err(mismatch("boolean", other)),
        },
        ValuePredicate::DateTime(p) => match value {
            None => Ok(p.negate),
            Some(v) => {
                let actual = value_as_datetime(v).ok_or_else(|| mismatch("datetime", v))?;
                datetime_matches(p, actual)
            }
        },
        ValuePredicate::Array(p) => match value {
            None => Ok(p.negated),
            Some(Value::Array(items)) => Ok(array_matches(p, items)),
            Some(other) => Err(mismatch("array", other)),
        },
    }
}

fn mismatch(predicate: &'static str, found: &Value) -> EvaluationError {
    EvaluationError::TypeMismatch {
        predicate,
        found: type_of(found),
    }
}

fn compare<T: PartialOrd>(
    operator: AssetQueryOperator,
    actual: T,
    value: T,
    range: Option<T>,
    equals: impl Fn(&T, &T) -> bool,
) -> Option<bool> {
    Some(match operator {
        AssetQueryOperator::Equals => equals(&actual, &value),
        AssetQueryOperator::GreaterThan => actual > value,
        AssetQueryOperator::GreaterEquals => actual >= value,
        AssetQueryOperator::LessThan => actual < value,
        AssetQueryOperator::LessEquals => actual <= value,
        // Inclusive on both ends.
        AssetQueryOperator::Between => {
            let upper = range?;
            actual >= value && actual <= upper
        }
    })
}

fn number_matches(p: &NumberPredicate, actual: f64) -> Result<bool, EvaluationError> {
    let value = p.value.ok_or_else(|| EvaluationError::InvalidOperand {
        predicate: "number",
        reason: "missing value".to_string(),
    })?;
    let hit = compare(p.operator, actual, value, p.range_value, |a, b| {
        (a - b).abs() < f64::EPSILON
    })
    .ok_or_else(|| EvaluationError::InvalidOperand {
        predicate: "number",
        reason: "BETWEEN requires rangeValue".to_string(),
    })?;
    Ok(hit != p.negate)
}

/// RFC 3339 strings and epoch milliseconds are both accepted.
fn value_as_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_datetime(s),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    s.parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

fn datetime_operand(raw: Option<&str>, field: &str) -> Result<DateTime<Utc>, EvaluationError> {
    let raw = raw.ok_or_else(|| EvaluationError::InvalidOperand {
        predicate: "datetime",
        reason: format!("missing {field}"),
    })?;
    parse_datetime(raw).ok_or_else(|| EvaluationError::InvalidOperand {
        predicate: "datetime",
        reason: format!("unparseable {field} '{raw}'"),
    })
}

fn datetime_matches(p: &DateTimePredicate, actual: DateTime<Utc>) -> Result<bool, EvaluationError> {
    let value = datetime_operand(p.value.as_deref(), "value")?;
    let range = match p.operator {
        AssetQueryOperator::Between => Some(datetime_operand(p.range_value.as_deref(), "rangeValue")?),
        _ => None,
    };
    let hit = compare(p.operator, actual, value, range, |a, b| a == b).unwrap_or(false);
    Ok(hit != p.negate)
}

/// All populated checks must hold.
fn array_matches(p: &ArrayPredicate, items: &[Value]) -> bool {
    let mut hit = true;
    if let Some(expected) = &p.value {
        hit &= match p.index {
            Some(i) => items.get(i) == Some(expected),
            None => items.contains(expected),
        };
    }
    if let Some(len) = p.length_equals {
        hit &= items.len() == len;
    }
    if let Some(len) = p.length_greater_than {
        hit &= items.len() > len;
    }
    if let Some(len) = p.length_less_than {
        hit &= items.len() < len;
    }
    hit != p.negated
}

// ── Attribute predicates ────────────────────────────────────────────

/// Follow a [`ValuePath`] into an object or array value.
///
/// String segments index objects, integer segments index arrays. Any miss
/// yields `None`.
pub fn resolve_path<'a>(value: Option<&'a Value>, path: &ValuePath) -> Option<&'a Value> {
    path.paths.iter().try_fold(value?, |current, segment| match segment {
        Value::String(key) => current.get(key.as_str()),
        Value::Number(n) => n.as_u64().and_then(|i| current.get(i as usize)),
        _ => None,
    })
}

/// Match one fact against an [`AttributePredicate`].
///
/// The attribute name must match; `negated` inverts the value match only.
/// `previousValue`, when present, must match the fact's old value too.
pub fn attribute_matches(
    pred: &AttributePredicate,
    fact: &AssetState,
) -> Result<bool, EvaluationError> {
    if let Some(name) = &pred.name {
        if !string_matches(name, &fact.attribute_name) {
            return Ok(false);
        }
    }

    if let Some(value_pred) = &pred.value {
        let value = match &pred.path {
            Some(path) => resolve_path(fact.value.as_ref(), path),
            None => fact.value.as_ref(),
        };
        if value_matches(value_pred, value)? == pred.negated {
            return Ok(false);
        }
    }

    if let Some(previous) = &pred.previous_value {
        if !value_matches(previous, fact.old_value.as_ref())? {
            return Ok(false);
        }
    }

    Ok(true)
}

/// [`attribute_matches`] with evaluation errors logged and treated as `false`.
pub(crate) fn attribute_matches_lenient(pred: &AttributePredicate, fact: &AssetState) -> bool {
    attribute_matches(pred, fact).unwrap_or_else(|e| {
        debug!(
            asset_id = %fact.id,
            attribute = %fact.attribute_name,
            error = %e,
            "predicate not applicable, treating as no match"
        );
        false
    })
}

// ── Tests ───────────────────────────────────────────────────────────
