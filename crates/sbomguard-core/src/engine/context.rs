//! The read-only bundle a single correlation attempt evaluates against.

use serde_json::Value;

use crate::model::{Component, ExposureLevel, IntelAnnotation, ServiceContext};

/// Everything one (component, vulnerability) evaluation can see.
///
/// Built fresh per correlation attempt, never mutated, never shared across
/// attempts. Component, context, and intel are typed; the vulnerability is
/// whatever shape the scanner emitted.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub component: &'a Component,
    pub vuln: &'a Value,
    pub context: Option<&'a ServiceContext>,
    pub intel: Option<&'a IntelAnnotation>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(
        component: &'a Component,
        vuln: &'a Value,
        context: Option<&'a ServiceContext>,
        intel: Option<&'a IntelAnnotation>,
    ) -> Self {
        Self {
            component,
            vuln,
            context,
            intel,
        }
    }

    /// Resolve a dot-separated field path to its value.
    ///
    /// The leading segment is alias-rewritten first (`vulnerability` →
    /// `vuln`, `package` → `component`) so both naming conventions address
    /// the same data. Paths without a recognized root are looked up in the
    /// raw vulnerability record, which also covers scanner-native names
    /// like `"Severity"`. Returns `None` (the absence marker) for anything
    /// unreachable; traversal stops the moment a non-container is
    /// encountered.
    pub fn resolve(&self, path: &str) -> Option<Value> {
        let mut parts = path.split('.');
        let root = parts.next().filter(|segment| !segment.is_empty())?;
        let rest: Vec<&str> = parts.collect();

        let root = match root {
            "vulnerability" => "vuln",
            "package" => "component",
            other => other,
        };

        let value = match root {
            "component" => self.component_field(&rest),
            "vuln" => dig(self.vuln, &rest),
            "context" => self.context_field(&rest),
            "threatintel" => self.intel_field(&rest),
            // Unprefixed paths address the vulnerability record directly.
            _ => {
                let mut full = vec![root];
                full.extend(&rest);
                dig(self.vuln, &full)
            }
        }?;

        if value.is_null() {
            None
        } else {
            Some(value)
        }
    }

    fn component_field(&self, rest: &[&str]) -> Option<Value> {
        let component = self.component;
        let Some(&field) = rest.first() else {
            return serde_json::to_value(component).ok();
        };
        match field {
            "name" if rest.len() == 1 => Some(Value::String(component.name.clone())),
            "version" if rest.len() == 1 => component.version.clone().map(Value::String),
            "purl" if rest.len() == 1 => component.purl.clone().map(Value::String),
            "supplier" if rest.len() == 1 => component.supplier.clone().map(Value::String),
            "hashes" => map_field(&component.hashes, &rest[1..]),
            "properties" => map_field(&component.properties, &rest[1..]),
            _ => None,
        }
    }

    fn context_field(&self, rest: &[&str]) -> Option<Value> {
        let context = self.context?;
        let Some(&field) = rest.first() else {
            return serde_json::to_value(context).ok();
        };
        match field {
            "service" if rest.len() == 1 => Some(Value::String(context.service.clone())),
            "environment" if rest.len() == 1 => Some(Value::String(context.environment.clone())),
            "internet_exposed" if rest.len() == 1 => Some(Value::Bool(context.internet_exposed)),
            "value_metric" if rest.len() == 1 => Some(Value::String(context.value_metric.clone())),
            "data_class" if rest.len() == 1 => serde_json::to_value(&context.data_class).ok(),
            "exposure" => match rest {
                ["exposure"] => serde_json::to_value(&context.exposure).ok(),
                ["exposure", "internet"] => match context.exposure.internet {
                    Some(ExposureLevel::Flag(flag)) => Some(Value::Bool(flag)),
                    Some(ExposureLevel::Level(level)) => {
                        serde_json::Number::from_f64(level).map(Value::Number)
                    }
                    None => None,
                },
                _ => None,
            },
            _ => None,
        }
    }

    fn intel_field(&self, rest: &[&str]) -> Option<Value> {
        let intel = self.intel?;
        let Some(&field) = rest.first() else {
            return serde_json::to_value(intel).ok();
        };
        match field {
            "kev_listed" if rest.len() == 1 => Some(Value::Bool(intel.kev_listed)),
            "chatter_score" if rest.len() == 1 => {
                serde_json::Number::from_f64(intel.chatter_score).map(Value::Number)
            }
            "sources" if rest.len() == 1 => serde_json::to_value(&intel.sources).ok(),
            _ => None,
        }
    }
}

/// Walk a raw JSON value by object keys; stop at the first non-container.
fn dig(value: &Value, parts: &[&str]) -> Option<Value> {
    let mut current = value;
    for part in parts {
        current = current.as_object()?.get(*part)?;
    }
    Some(current.clone())
}

fn map_field(
    map: &std::collections::BTreeMap<String, String>,
    rest: &[&str],
) -> Option<Value> {
    match rest {
        [] => serde_json::to_value(map).ok(),
        [key] => map.get(*key).cloned().map(Value::String),
        _ => None,
    }
}
