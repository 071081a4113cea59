//! Final threat assembly.
//!
//! Combines a matched hypothesis, its score, and evidence pulled from the
//! vulnerability record into a [`ScoredThreat`]. Total: missing evidence
//! fields become `None`, never a failure.

use serde_json::Value;

use crate::model::{
    AssetValue, Component, IntelAnnotation, ScoredThreat, ServiceContext, ThreatEvidence,
    ThreatHypothesis, ThreatTarget,
};
use crate::scoring::extract_cvss;

/// Status every threat starts in. Downstream consumers own it afterwards.
pub const STATUS_OPEN: &str = "open";

/// Assemble the persistence/reporting record for one scored rule match.
pub fn assemble(
    hypothesis: &ThreatHypothesis,
    score: f64,
    component: &Component,
    vuln: &Value,
    context: Option<&ServiceContext>,
    intel: Option<&IntelAnnotation>,
) -> ScoredThreat {
    let service = context
        .map(|ctx| ctx.service.clone())
        .unwrap_or_else(|| "unknown".to_string());
    let value = AssetValue {
        data_class: context.map(|ctx| ctx.data_class.clone()).unwrap_or_default(),
        value_metric: context
            .map(|ctx| ctx.value_metric.clone())
            .unwrap_or_else(|| "medium".to_string()),
    };

    // Scanner-native names first, normalized names as fallback.
    let evidence = ThreatEvidence {
        cve: extract_field(vuln, &["VulnerabilityID", "cve"]),
        severity: extract_field(vuln, &["Severity", "severity"]),
        cvss: extract_cvss(vuln),
        exploit_maturity: extract_field(vuln, &["Exploitability", "exploit_maturity"]),
        intel: intel.cloned(),
    };

    ScoredThreat {
        rule_id: hypothesis.rule_id.clone(),
        description: hypothesis.description.clone(),
        target: ThreatTarget {
            service,
            component: component.clone(),
        },
        value,
        pattern: hypothesis.pattern.clone(),
        objective: hypothesis.objective.clone(),
        evidence,
        recommended_actions: hypothesis.recommendations.clone(),
        score,
        status: STATUS_OPEN.to_string(),
    }
}

/// Return the first non-empty value under any of the given keys, as a
/// string.
pub fn extract_field(vuln: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match vuln.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
