//! Rule catalog loading and authoring-shape normalization.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::condition::Condition;
use super::types::{Rule, RuleMetadata, RuleResult};
use crate::model::RuleSeverity;

/// Load every rule from the JSON files in a directory.
///
/// Files are visited in file-name order; each holds a single rule object or
/// an array of them. The returned order (file-sort, then in-file) fixes the
/// hypothesis emission order of the correlation engine.
///
/// A malformed file is logged and skipped; it is never fatal to the load.
/// Rules without an id, without any conditions, or with `enabled: false`
/// are dropped.
pub fn load_rules_dir(dir: &Path) -> Result<Vec<Rule>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("reading rules directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut rules = Vec::new();
    let mut seen_ids = HashSet::new();

    for path in &paths {
        let payload: Value = match std::fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|text| serde_json::from_str(&text).map_err(anyhow::Error::from))
        {
            Ok(payload) => payload,
            Err(e) => {
                warn!(file = %path.display(), "skipping malformed rule file: {e}");
                continue;
            }
        };

        let entries = match payload {
            Value::Array(entries) => entries,
            obj @ Value::Object(_) => vec![obj],
            _ => {
                warn!(file = %path.display(), "rule file is neither an object nor an array");
                continue;
            }
        };

        for entry in &entries {
            if let Some(rule) = normalize_rule(entry) {
                if !seen_ids.insert(rule.id.clone()) {
                    warn!(rule_id = %rule.id, file = %path.display(), "duplicate rule id; keeping both");
                }
                rules.push(rule);
            }
        }
    }

    info!(count = rules.len(), files = paths.len(), "loaded rule catalog");
    Ok(rules)
}

/// Normalize one authored entry into the canonical [`Rule`].
///
/// Returns `None` for entries that must be dropped (missing id, missing
/// conditions, disabled).
fn normalize_rule(entry: &Value) -> Option<Rule> {
    let entry = entry.as_object()?;

    let id = entry
        .get("id")
        .or_else(|| entry.get("rule_id"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let Some(id) = id else {
        debug!("dropping rule without id");
        return None;
    };

    if !entry.get("enabled").and_then(Value::as_bool).unwrap_or(true) {
        debug!(rule_id = %id, "dropping disabled rule");
        return None;
    }

    // `conditions` (plural, list) or the `condition` (singular) shorthand.
    let raw_conditions: Vec<Value> = if let Some(list) = entry.get("conditions") {
        match list.as_array() {
            Some(list) => list.clone(),
            None => {
                debug!(rule_id = %id, "conditions is not a list; dropping rule");
                return None;
            }
        }
    } else if let Some(single) = entry.get("condition") {
        vec![single.clone()]
    } else {
        debug!(rule_id = %id, "dropping rule without conditions");
        return None;
    };
    let conditions = raw_conditions.iter().map(Condition::from_value).collect();

    let title = entry.get("title").and_then(Value::as_str);
    let body = entry.get("description").and_then(Value::as_str);
    let description = match (title, body) {
        (Some(title), Some(body)) => format!("{title}: {body}"),
        (Some(title), None) => title.to_string(),
        (None, Some(body)) => body.to_string(),
        (None, None) => String::new(),
    };

    let tags = string_list(entry.get("tags"));
    let remediation = entry
        .get("remediation")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let result = match entry.get("result").and_then(Value::as_object) {
        Some(result) => RuleResult {
            pattern: string_list(result.get("pattern")),
            objective: string_list(result.get("objective")),
            recommendations: result
                .get("recommendations")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            pattern_multiplier: result
                .get("pattern_multiplier")
                .and_then(Value::as_f64)
                .unwrap_or(1.0),
        },
        // Shorthand: synthesize the result from tags/objective/remediation.
        None => RuleResult {
            pattern: if tags.is_empty() {
                vec![id.clone()]
            } else {
                tags.clone()
            },
            objective: string_list(entry.get("objective")),
            recommendations: remediation
                .as_deref()
                .map(|text| {
                    vec![serde_json::json!({
                        "type": "remediation",
                        "detail": text,
                    })]
                })
                .unwrap_or_default(),
            pattern_multiplier: entry
                .get("pattern_multiplier")
                .and_then(Value::as_f64)
                .unwrap_or(1.0),
        },
    };

    let score_factors: BTreeMap<String, f64> = entry
        .get("score_factors")
        .and_then(Value::as_object)
        .map(|factors| {
            factors
                .iter()
                .filter_map(|(k, v)| v.as_f64().map(|v| (k.clone(), v)))
                .collect()
        })
        .unwrap_or_default();

    let severity = entry
        .get("severity")
        .and_then(Value::as_str)
        .map(parse_severity)
        .unwrap_or_default();

    let metadata = RuleMetadata {
        scope: entry
            .get("scope")
            .and_then(Value::as_str)
            .map(str::to_string),
        tags,
        remediation,
        last_updated: entry
            .get("last_updated")
            .and_then(Value::as_str)
            .map(str::to_string),
    };

    Some(Rule {
        id,
        description,
        conditions,
        result,
        score_factors,
        severity,
        metadata,
    })
}

fn parse_severity(label: &str) -> RuleSeverity {
    match label.to_ascii_lowercase().as_str() {
        "low" => RuleSeverity::Low,
        "high" => RuleSeverity::High,
        _ => RuleSeverity::Medium,
    }
}

/// Accept a string, or a list of scalars, as a list of strings.
fn string_list(raw: Option<&Value>) -> Vec<String> {
    match raw {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_rules(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn loads_explicit_shape() {
        let dir = TempDir::new().unwrap();
        write_rules(
            &dir,
            "high.json",
            r#"{
                "id": "high-cvss",
                "description": "High CVSS finding",
                "conditions": [{"vuln.cvss": {"gte": 7.0}}],
                "result": {
                    "pattern": ["exploitation"],
                    "objective": ["compromise"],
                    "recommendations": [{"type": "patch", "detail": "upgrade"}],
                    "pattern_multiplier": 1.3
                },
                "score_factors": {"cvss_weight": 0.6},
                "severity": "high"
            }"#,
        );

        let rules = load_rules_dir(dir.path()).unwrap();
        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(rule.id, "high-cvss");
        assert_eq!(rule.result.pattern, vec!["exploitation"]);
        assert_eq!(rule.result.pattern_multiplier, 1.3);
        assert_eq!(rule.score_factors.get("cvss_weight"), Some(&0.6));
        assert_eq!(rule.severity, RuleSeverity::High);
    }

    #[test]
    fn shorthand_shape_synthesizes_result() {
        let dir = TempDir::new().unwrap();
        write_rules(
            &dir,
            "short.json",
            r#"{
                "rule_id": "kev-listed",
                "title": "KEV listed",
                "description": "actively exploited",
                "condition": {"threatintel.kev_listed": {"eq": true}},
                "tags": ["kev", "exploited"],
                "remediation": "patch immediately",
                "objective": "initial access"
            }"#,
        );

        let rules = load_rules_dir(dir.path()).unwrap();
        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(rule.id, "kev-listed");
        assert_eq!(rule.description, "KEV listed: actively exploited");
        assert_eq!(rule.conditions.len(), 1);
        assert_eq!(rule.result.pattern, vec!["kev", "exploited"]);
        assert_eq!(rule.result.objective, vec!["initial access"]);
        assert_eq!(rule.result.recommendations.len(), 1);
        assert_eq!(
            rule.result.recommendations[0]["type"],
            serde_json::json!("remediation")
        );
        assert_eq!(rule.result.pattern_multiplier, 1.0);
    }

    #[test]
    fn shorthand_without_tags_defaults_pattern_to_id() {
        let dir = TempDir::new().unwrap();
        write_rules(
            &dir,
            "bare.json",
            r#"{"id": "bare", "condition": {"vuln.severity": "HIGH"}}"#,
        );

        let rules = load_rules_dir(dir.path()).unwrap();
        assert_eq!(rules[0].result.pattern, vec!["bare"]);
    }

    #[test]
    fn drops_disabled_and_incomplete_rules() {
        let dir = TempDir::new().unwrap();
        write_rules(
            &dir,
            "mixed.json",
            r#"[
                {"id": "disabled", "enabled": false, "conditions": [{}]},
                {"description": "no id", "conditions": [{}]},
                {"id": "no-conditions"},
                {"id": "kept", "conditions": []}
            ]"#,
        );

        let rules = load_rules_dir(dir.path()).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "kept");
        assert!(rules[0].conditions.is_empty());
    }

    #[test]
    fn malformed_file_is_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        write_rules(&dir, "a_broken.json", "{not json");
        write_rules(
            &dir,
            "b_good.json",
            r#"{"id": "survivor", "conditions": [{}]}"#,
        );

        let rules = load_rules_dir(dir.path()).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "survivor");
    }

    #[test]
    fn order_is_file_sort_then_in_file() {
        let dir = TempDir::new().unwrap();
        write_rules(
            &dir,
            "b.json",
            r#"[{"id": "third", "conditions": [{}]}, {"id": "fourth", "conditions": [{}]}]"#,
        );
        write_rules(
            &dir,
            "a.json",
            r#"[{"id": "first", "conditions": [{}]}, {"id": "second", "conditions": [{}]}]"#,
        );

        let rules = load_rules_dir(dir.path()).unwrap();
        let ids: Vec<_> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third", "fourth"]);
    }

    #[test]
    fn duplicate_ids_are_both_kept() {
        let dir = TempDir::new().unwrap();
        write_rules(&dir, "a.json", r#"{"id": "dup", "conditions": [{}]}"#);
        write_rules(&dir, "b.json", r#"{"id": "dup", "conditions": [{}]}"#);

        let rules = load_rules_dir(dir.path()).unwrap();
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn non_json_files_are_ignored() {
        let dir = TempDir::new().unwrap();
        write_rules(&dir, "notes.txt", "not a rule");
        write_rules(&dir, "r.json", r#"{"id": "only", "conditions": [{}]}"#);

        let rules = load_rules_dir(dir.path()).unwrap();
        assert_eq!(rules.len(), 1);
    }
}
