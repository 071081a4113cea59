//! The condition language rules are written in.
//!
//! Conditions are a closed sum type: the JSON authoring format is parsed
//! once at catalog-load time and anything unrecognized degrades to
//! [`Condition::Never`], which matches nothing but never errors.

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Maximum compiled regex size (256 KB) to prevent ReDoS via pathological
/// patterns in rule files.
const MAX_REGEX_SIZE: usize = 256 * 1024;

/// A single condition node, simple or structural.
#[derive(Debug, Clone)]
pub enum Condition {
    /// Empty condition object; matches every context.
    Always,
    /// Field/operator checks against one dot-path. All checks must pass.
    Simple { field: String, checks: Vec<Check> },
    /// Pattern match against the stringified value of any listed field.
    /// Covers both the `regex` (one field) and `regex_any` (many) forms.
    Regex { fields: Vec<String>, regex: Regex },
    /// Stringified value must equal one of the listed literals.
    /// Covers both the `any_of` and `in_list` forms.
    AnyOf { field: String, values: Vec<Value> },
    /// Semantic-version strictly-less-than between two fields.
    VersionLtField { field: String, compare_to: String },
    /// True if any listed field is absent or empty.
    MissingFields { fields: Vec<String> },
    /// Nested AND of subconditions.
    All { conditions: Vec<Condition> },
    /// Field presence test; `negate` flips it into `not_exists`.
    Exists { field: String, negate: bool },
    /// Unknown operator/match-type or invalid pattern; never matches.
    Never,
}

/// One operator/literal check inside a simple condition.
#[derive(Debug, Clone)]
pub struct Check {
    pub op: CmpOp,
    pub expected: Value,
}

/// Operators accepted in simple conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Neq,
    Gte,
    Lte,
    Gt,
    Lt,
    In,
    Contains,
    Exists,
    /// Anything else. Evaluates to false.
    Unknown,
}

impl CmpOp {
    fn parse(op: &str) -> Self {
        match op {
            "eq" => CmpOp::Eq,
            "neq" => CmpOp::Neq,
            "gte" => CmpOp::Gte,
            "lte" => CmpOp::Lte,
            "gt" => CmpOp::Gt,
            "lt" => CmpOp::Lt,
            "in" => CmpOp::In,
            "contains" => CmpOp::Contains,
            "exists" => CmpOp::Exists,
            other => {
                debug!(operator = other, "unknown condition operator");
                CmpOp::Unknown
            }
        }
    }
}

impl Condition {
    /// Parse a condition from its JSON authoring form.
    ///
    /// Never fails: malformed or unrecognized input becomes
    /// [`Condition::Never`] so a single bad condition can only make its own
    /// rule unmatched, not break the catalog.
    pub fn from_value(raw: &Value) -> Self {
        let map = match raw {
            Value::Object(map) if map.is_empty() => return Condition::Always,
            Value::Object(map) => map,
            _ => return Condition::Never,
        };

        if let Some(match_type) = map.get("match_type").and_then(Value::as_str) {
            return Self::from_match_type(match_type, map);
        }

        // Simple form: each key is a field path, each value a literal
        // (implicit eq) or an operator -> literal object.
        let mut simples: Vec<Condition> = map
            .iter()
            .map(|(field, value)| Condition::Simple {
                field: field.clone(),
                checks: parse_checks(value),
            })
            .collect();
        if simples.len() == 1 {
            simples.remove(0)
        } else {
            Condition::All { conditions: simples }
        }
    }

    fn from_match_type(match_type: &str, map: &Map<String, Value>) -> Self {
        match match_type {
            "regex" => {
                let Some(field) = str_field(map, "field") else {
                    return Condition::Never;
                };
                compile_regex(map, vec![field])
            }
            "regex_any" => {
                let fields = str_list(map, "fields");
                if fields.is_empty() {
                    return Condition::Never;
                }
                compile_regex(map, fields)
            }
            "any_of" | "in_list" => {
                let Some(field) = str_field(map, "field") else {
                    return Condition::Never;
                };
                let values = map
                    .get("values")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                Condition::AnyOf { field, values }
            }
            "version_lt_field" => {
                match (str_field(map, "field"), str_field(map, "compare_to")) {
                    (Some(field), Some(compare_to)) => {
                        Condition::VersionLtField { field, compare_to }
                    }
                    _ => Condition::Never,
                }
            }
            "missing_fields" => Condition::MissingFields {
                fields: str_list(map, "fields"),
            },
            "and" => {
                let conditions = map
                    .get("conditions")
                    .and_then(Value::as_array)
                    .map(|items| items.iter().map(Condition::from_value).collect())
                    .unwrap_or_default();
                Condition::All { conditions }
            }
            "exists" | "not_exists" => match str_field(map, "field") {
                Some(field) => Condition::Exists {
                    field,
                    negate: match_type == "not_exists",
                },
                None => Condition::Never,
            },
            other => {
                debug!(match_type = other, "unknown condition match-type");
                Condition::Never
            }
        }
    }
}

fn parse_checks(value: &Value) -> Vec<Check> {
    match value {
        Value::Object(ops) => ops
            .iter()
            .map(|(op, expected)| Check {
                op: CmpOp::parse(op),
                expected: expected.clone(),
            })
            .collect(),
        literal => vec![Check {
            op: CmpOp::Eq,
            expected: literal.clone(),
        }],
    }
}

fn str_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn str_list(map: &Map<String, Value>, key: &str) -> Vec<String> {
    map.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn compile_regex(map: &Map<String, Value>, fields: Vec<String>) -> Condition {
    let Some(pattern) = map.get("pattern").and_then(Value::as_str) else {
        return Condition::Never;
    };
    let flags = map.get("flags").and_then(Value::as_str).unwrap_or("");
    match RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .size_limit(MAX_REGEX_SIZE)
        .build()
    {
        Ok(regex) => Condition::Regex { fields, regex },
        Err(e) => {
            warn!(pattern, "invalid regex in rule condition: {e}");
            Condition::Never
        }
    }
}
