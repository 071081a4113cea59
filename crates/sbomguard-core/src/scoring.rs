//! Weighted-sum risk scoring.
//!
//! `compute_score` is total: any well-formed input, including empty factor
//! maps and absent context, produces a score in `[0, 100]`.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::model::{ExposureLevel, ServiceContext};

/// Default weighting factors. Overridable per rule; the defaults sum to
/// 1.0 but overrides are not required to.
pub const DEFAULT_CVSS_WEIGHT: f64 = 0.5;
pub const DEFAULT_EXPLOITABILITY_WEIGHT: f64 = 0.3;
pub const DEFAULT_ASSET_VALUE_WEIGHT: f64 = 0.15;
pub const DEFAULT_EXPOSURE_WEIGHT: f64 = 0.05;

/// Exposure contribution when nothing is known about the service.
const EXPOSURE_DEFAULT: f64 = 0.3;

/// Compute the risk score for one rule match.
///
/// `baseline = cvss_weight * cvss/10 + exploitability_weight * maturity
/// + asset_value_weight * value + exposure_weight * exposure`, then
/// `100 * min(1, baseline * pattern_multiplier)` rounded to 2 decimals.
/// The caller folds any rule-severity multiplier into
/// `pattern_multiplier` beforehand.
pub fn compute_score(
    vuln: &Value,
    context: Option<&ServiceContext>,
    factors: &BTreeMap<String, f64>,
    pattern_multiplier: f64,
) -> f64 {
    let severity_score = extract_cvss(vuln).unwrap_or(0.0) / 10.0;
    let exploitability = exploitability_factor(vuln);
    let asset_value = asset_value_factor(context);
    let exposure = exposure_factor(context);

    let cvss_weight = factor(factors, &["cvss_weight"], DEFAULT_CVSS_WEIGHT);
    // `exploit_maturity_weight` is the legacy name for the same factor.
    let exploitability_weight = factor(
        factors,
        &["exploitability_weight", "exploit_maturity_weight"],
        DEFAULT_EXPLOITABILITY_WEIGHT,
    );
    let asset_value_weight = factor(factors, &["asset_value_weight"], DEFAULT_ASSET_VALUE_WEIGHT);
    let exposure_weight = factor(factors, &["exposure_weight"], DEFAULT_EXPOSURE_WEIGHT);

    let baseline = cvss_weight * severity_score
        + exploitability_weight * exploitability
        + asset_value_weight * asset_value
        + exposure_weight * exposure;

    let score = 100.0 * (baseline * pattern_multiplier).min(1.0);
    (score.max(0.0) * 100.0).round() / 100.0
}

fn factor(factors: &BTreeMap<String, f64>, names: &[&str], default: f64) -> f64 {
    names
        .iter()
        .find_map(|name| factors.get(*name).copied())
        .unwrap_or(default)
}

/// Read the CVSS score from a scanner-native or normalized record:
/// a direct number under `CVSS`/`cvss`, or a nested object's
/// `nvd`/`Score`/`score`.
pub fn extract_cvss(vuln: &Value) -> Option<f64> {
    let raw = vuln.get("CVSS").or_else(|| vuln.get("cvss"))?;
    match raw {
        Value::Object(nested) => nested
            .get("nvd")
            .or_else(|| nested.get("Score"))
            .or_else(|| nested.get("score"))
            .and_then(as_number),
        scalar => as_number(scalar),
    }
}

/// Accept numbers and numeric strings, the way scanners emit them.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn exploitability_factor(vuln: &Value) -> f64 {
    let label = vuln
        .get("Exploitability")
        .or_else(|| vuln.get("exploit_maturity"))
        .and_then(Value::as_str)
        .unwrap_or("NONE");
    match label.to_ascii_uppercase().as_str() {
        "PROOF_OF_CONCEPT" => 0.6,
        "ACTIVE" | "ACTIVE_EXPLOIT" => 1.0,
        _ => 0.0,
    }
}

fn asset_value_factor(context: Option<&ServiceContext>) -> f64 {
    let label = context.map(|ctx| ctx.value_metric.as_str()).unwrap_or("medium");
    match label.to_ascii_lowercase().as_str() {
        "low" => 0.2,
        "high" => 1.0,
        _ => 0.5,
    }
}

fn exposure_factor(context: Option<&ServiceContext>) -> f64 {
    let Some(context) = context else {
        return EXPOSURE_DEFAULT;
    };
    match context.exposure.internet {
        Some(ExposureLevel::Flag(true)) => 1.0,
        Some(ExposureLevel::Flag(false)) => 0.3,
        Some(ExposureLevel::Level(level)) => level,
        // Fall back to the coarse service-level flag.
        None => {
            if context.internet_exposed {
                1.0
            } else {
                0.3
            }
        }
    }
}
