//! Canonical rule representation.
//!
//! Both authoring shapes (explicit `conditions`/`result` and the
//! `condition`/`tags`/`remediation` shorthand) normalize into [`Rule`] at
//! load time; evaluation never sees which shape was used.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::condition::Condition;
use crate::model::RuleSeverity;

/// A single correlation rule, immutable once loaded.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Catalog identifier. Duplicates across files are kept, not merged.
    pub id: String,
    pub description: String,
    /// AND-combined: every condition must match for the rule to fire.
    pub conditions: Vec<Condition>,
    pub result: RuleResult,
    /// Per-rule overrides for the scorer's weighting factors.
    pub score_factors: BTreeMap<String, f64>,
    pub severity: RuleSeverity,
    pub metadata: RuleMetadata,
}

/// The result template stamped onto every hypothesis this rule emits.
#[derive(Debug, Clone, Default)]
pub struct RuleResult {
    /// Attack-pattern labels (defaults to the rule's tags, then `[id]`).
    pub pattern: Vec<String>,
    pub objective: Vec<String>,
    /// Free-form recommendation entries; shape is owned by rule authors.
    pub recommendations: Vec<Value>,
    pub pattern_multiplier: f64,
}

/// Descriptive rule metadata carried through to consumers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuleMetadata {
    pub scope: Option<String>,
    pub tags: Vec<String>,
    pub remediation: Option<String>,
    pub last_updated: Option<String>,
}
