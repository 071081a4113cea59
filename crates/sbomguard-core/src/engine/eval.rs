//! Pure condition evaluation.
//!
//! `evaluate` is total: it never errors and never panics on malformed or
//! partial input. Each operator defines its own semantics for absent data.

use std::cmp::Ordering;

use serde_json::Value;

use super::context::EvaluationContext;
use crate::rules::condition::{CmpOp, Condition};

/// Evaluate a single condition against a context.
pub fn evaluate(condition: &Condition, ctx: &EvaluationContext<'_>) -> bool {
    match condition {
        Condition::Always => true,
        Condition::Never => false,
        Condition::Simple { field, checks } => {
            let actual = ctx.resolve(field);
            checks
                .iter()
                .all(|check| apply_check(check.op, actual.as_ref(), &check.expected))
        }
        Condition::Regex { fields, regex } => fields.iter().any(|field| {
            ctx.resolve(field)
                .and_then(|value| value_to_string(&value))
                .is_some_and(|text| regex.is_match(&text))
        }),
        Condition::AnyOf { field, values } => {
            let Some(actual) = ctx.resolve(field).and_then(|value| value_to_string(&value))
            else {
                return false;
            };
            values
                .iter()
                .filter_map(value_to_string)
                .any(|candidate| candidate == actual)
        }
        Condition::VersionLtField { field, compare_to } => {
            let lhs = ctx.resolve(field).and_then(|value| parse_version(&value));
            let rhs = ctx
                .resolve(compare_to)
                .and_then(|value| parse_version(&value));
            matches!((lhs, rhs), (Some(a), Some(b)) if a < b)
        }
        Condition::MissingFields { fields } => fields
            .iter()
            .any(|field| !is_present(ctx.resolve(field).as_ref())),
        Condition::All { conditions } => conditions.iter().all(|inner| evaluate(inner, ctx)),
        Condition::Exists { field, negate } => {
            is_present(ctx.resolve(field).as_ref()) != *negate
        }
    }
}

fn apply_check(op: CmpOp, actual: Option<&Value>, expected: &Value) -> bool {
    match op {
        CmpOp::Eq => actual.is_some_and(|actual| loose_eq(actual, expected)),
        CmpOp::Neq => !actual.is_some_and(|actual| loose_eq(actual, expected)),
        CmpOp::Gte => ordered(actual, expected, |ord| ord != Ordering::Less),
        CmpOp::Lte => ordered(actual, expected, |ord| ord != Ordering::Greater),
        CmpOp::Gt => ordered(actual, expected, |ord| ord == Ordering::Greater),
        CmpOp::Lt => ordered(actual, expected, |ord| ord == Ordering::Less),
        CmpOp::In => match (actual, expected.as_array()) {
            (Some(actual), Some(candidates)) => {
                candidates.iter().any(|candidate| loose_eq(actual, candidate))
            }
            _ => false,
        },
        CmpOp::Contains => match actual {
            Some(Value::Array(items)) => items.iter().any(|item| loose_eq(item, expected)),
            Some(Value::String(text)) => {
                value_to_string(expected).is_some_and(|needle| text.contains(&needle))
            }
            _ => false,
        },
        CmpOp::Exists => is_present(actual),
        CmpOp::Unknown => false,
    }
}

fn ordered(actual: Option<&Value>, expected: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    actual
        .and_then(|actual| compare_values(actual, expected))
        .is_some_and(accept)
}

/// Equality with numeric coercion, so `8` and `8.0` compare equal.
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Ordering across the scalar types that order meaningfully.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Presence test: empty strings, arrays, and maps count as absent.
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(_) => true,
    }
}

/// Stringify a value for regex and set-membership matching.
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        other => serde_json::to_string(other).ok(),
    }
}

/// Parse a semantic version, tolerating a leading `v`.
fn parse_version(value: &Value) -> Option<semver::Version> {
    let text = value.as_str()?.trim();
    let text = text
        .strip_prefix('v')
        .or_else(|| text.strip_prefix('V'))
        .unwrap_or(text);
    semver::Version::parse(text).ok()
}
