//! Shared data model for the scan pipeline.
//!
//! Components, service context, and threat-intel annotations are typed;
//! vulnerability records stay raw [`serde_json::Value`]s because they arrive
//! in whatever shape the scanner produced them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A software component parsed from an SBOM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub purl: Option<String>,
    #[serde(default)]
    pub supplier: Option<String>,
    /// Content hashes keyed by algorithm (e.g. `"SHA-256"`).
    #[serde(default)]
    pub hashes: BTreeMap<String, String>,
    /// Free-form SBOM properties keyed by name.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// Deployment context for the service a component belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceContext {
    pub service: String,
    pub environment: String,
    pub internet_exposed: bool,
    /// Data classifications handled by the service (e.g. `["pii"]`).
    pub data_class: Vec<String>,
    /// Business value label: `"low"`, `"medium"`, or `"high"`.
    pub value_metric: String,
    #[serde(default)]
    pub exposure: ExposureProfile,
}

impl Default for ServiceContext {
    fn default() -> Self {
        Self {
            service: "unknown".to_string(),
            environment: "dev".to_string(),
            internet_exposed: false,
            data_class: Vec::new(),
            value_metric: "medium".to_string(),
            exposure: ExposureProfile::default(),
        }
    }
}

/// Exposure facets of a service. Currently only internet exposure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposureProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internet: Option<ExposureLevel>,
}

/// Internet exposure expressed either as a flag or a 0.0..=1.0 level.
///
/// Context files in the wild use both (`"internet": true` and
/// `"internet": 0.8`), so both deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExposureLevel {
    Flag(bool),
    Level(f64),
}

/// Threat-intel annotation attached to a vulnerability before correlation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntelAnnotation {
    #[serde(default)]
    pub kev_listed: bool,
    #[serde(default)]
    pub chatter_score: f64,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Severity a rule author assigns to a rule, independent of CVSS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    Low,
    #[default]
    Medium,
    High,
}

impl RuleSeverity {
    /// Multiplier folded into the pattern multiplier before scoring.
    pub fn multiplier(self) -> f64 {
        match self {
            RuleSeverity::Low => 0.8,
            RuleSeverity::Medium => 1.0,
            RuleSeverity::High => 1.2,
        }
    }
}

impl fmt::Display for RuleSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSeverity::Low => write!(f, "low"),
            RuleSeverity::Medium => write!(f, "medium"),
            RuleSeverity::High => write!(f, "high"),
        }
    }
}

/// The unscored output of a single rule match.
#[derive(Debug, Clone, Serialize)]
pub struct ThreatHypothesis {
    pub rule_id: String,
    pub description: String,
    pub pattern: Vec<String>,
    pub objective: Vec<String>,
    pub recommendations: Vec<Value>,
    pub pattern_multiplier: f64,
    pub score_factors: BTreeMap<String, f64>,
    pub rule_severity: RuleSeverity,
    pub metadata: crate::rules::RuleMetadata,
}

/// What a threat targets: the service and the concrete component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatTarget {
    pub service: String,
    pub component: Component,
}

/// The business value at stake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetValue {
    pub data_class: Vec<String>,
    pub value_metric: String,
}

/// Evidence extracted from the vulnerability record backing a threat.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreatEvidence {
    #[serde(default)]
    pub cve: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub cvss: Option<f64>,
    #[serde(default)]
    pub exploit_maturity: Option<String>,
    #[serde(default)]
    pub intel: Option<IntelAnnotation>,
}

/// A fully assembled, scored threat ready for persistence and reporting.
///
/// Nothing in the core mutates a `ScoredThreat` after assembly; `status`
/// is owned by external consumers and starts out as `"open"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredThreat {
    pub rule_id: String,
    pub description: String,
    pub target: ThreatTarget,
    pub value: AssetValue,
    pub pattern: Vec<String>,
    pub objective: Vec<String>,
    pub evidence: ThreatEvidence,
    pub recommended_actions: Vec<Value>,
    /// Risk score in `[0, 100]`, rounded to 2 decimal places.
    pub score: f64,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_severity_multipliers() {
        assert_eq!(RuleSeverity::Low.multiplier(), 0.8);
        assert_eq!(RuleSeverity::Medium.multiplier(), 1.0);
        assert_eq!(RuleSeverity::High.multiplier(), 1.2);
        assert_eq!(RuleSeverity::default(), RuleSeverity::Medium);
    }

    #[test]
    fn rule_severity_parses_lowercase() {
        let sev: RuleSeverity = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(sev, RuleSeverity::High);
    }

    #[test]
    fn exposure_level_accepts_flag_and_number() {
        let profile: ExposureProfile = serde_json::from_str(r#"{"internet": true}"#).unwrap();
        assert_eq!(profile.internet, Some(ExposureLevel::Flag(true)));

        let profile: ExposureProfile = serde_json::from_str(r#"{"internet": 0.8}"#).unwrap();
        assert_eq!(profile.internet, Some(ExposureLevel::Level(0.8)));
    }

    #[test]
    fn service_context_defaults() {
        let ctx = ServiceContext::default();
        assert_eq!(ctx.service, "unknown");
        assert_eq!(ctx.value_metric, "medium");
        assert!(!ctx.internet_exposed);
    }
}
