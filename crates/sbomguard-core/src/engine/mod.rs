//! Rule correlation engine.
//!
//! Holds the immutable rule catalog and turns (component, vulnerability,
//! context, intel) tuples into threat hypotheses. Evaluation order is
//! catalog order, so identical inputs always produce the identical
//! hypothesis sequence.

pub mod context;
pub mod eval;

use std::path::Path;

use anyhow::Result;
use serde_json::Value;

use crate::model::{Component, IntelAnnotation, ServiceContext, ThreatHypothesis};
use crate::rules::{load_rules_dir, Rule};

pub use context::EvaluationContext;
pub use eval::evaluate;

/// The correlation engine. Cheap to share: once constructed, the catalog is
/// read-only and evaluation takes `&self`.
#[derive(Debug)]
pub struct CorrelationEngine {
    rules: Vec<Rule>,
}

impl CorrelationEngine {
    /// Build an engine over an already-loaded catalog.
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Load the catalog from a rules directory.
    pub fn from_directory(dir: &Path) -> Result<Self> {
        Ok(Self::new(load_rules_dir(dir)?))
    }

    /// The loaded catalog, in emission order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Evaluate every rule against one correlated vulnerability.
    ///
    /// Returns one hypothesis per fully-matching rule, in catalog order.
    /// A rule's condition list is AND-combined; an empty list matches
    /// vacuously.
    pub fn evaluate_rules(
        &self,
        component: &Component,
        vuln: &Value,
        service_context: Option<&ServiceContext>,
        intel: Option<&IntelAnnotation>,
    ) -> Vec<ThreatHypothesis> {
        let ctx = EvaluationContext::new(component, vuln, service_context, intel);
        self.rules
            .iter()
            .filter(|rule| rule.conditions.iter().all(|cond| evaluate(cond, &ctx)))
            .map(hypothesis_from)
            .collect()
    }
}

fn hypothesis_from(rule: &Rule) -> ThreatHypothesis {
    ThreatHypothesis {
        rule_id: rule.id.clone(),
        description: rule.description.clone(),
        pattern: rule.result.pattern.clone(),
        objective: rule.result.objective.clone(),
        recommendations: rule.result.recommendations.clone(),
        pattern_multiplier: rule.result.pattern_multiplier,
        score_factors: rule.score_factors.clone(),
        rule_severity: rule.severity,
        metadata: rule.metadata.clone(),
    }
}
