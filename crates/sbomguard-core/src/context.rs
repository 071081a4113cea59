//! Service context mapping loader.
//!
//! A context file is a JSON array of entries that attach deployment context
//! to components, keyed by purl with a name fallback.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::model::{Component, ExposureProfile, ServiceContext};

#[derive(Debug, Deserialize)]
struct RawContextEntry {
    #[serde(default)]
    component_purl: Option<String>,
    #[serde(default)]
    component_name: Option<String>,
    #[serde(default)]
    service: Option<String>,
    #[serde(default)]
    environment: Option<String>,
    #[serde(default)]
    internet_exposed: Option<bool>,
    /// A single label or a list of labels.
    #[serde(default)]
    data_class: Option<Value>,
    #[serde(default)]
    value_metric: Option<String>,
    #[serde(default)]
    exposure: Option<ExposureProfile>,
}

/// Load a context mapping file. Entries without a purl or name key are
/// skipped.
pub fn load_context_map(path: &Path) -> Result<BTreeMap<String, ServiceContext>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading context file {}", path.display()))?;
    let entries: Vec<RawContextEntry> = serde_json::from_str(&text)
        .with_context(|| format!("parsing context file {}", path.display()))?;

    let mut mapping = BTreeMap::new();
    for entry in entries {
        let Some(key) = entry.component_purl.clone().or_else(|| entry.component_name.clone())
        else {
            continue;
        };
        mapping.insert(key, into_context(entry));
    }
    Ok(mapping)
}

/// Find the context for a component: purl first, then name.
pub fn resolve<'a>(
    mapping: &'a BTreeMap<String, ServiceContext>,
    component: &Component,
) -> Option<&'a ServiceContext> {
    if let Some(purl) = component.purl.as_deref() {
        if let Some(ctx) = mapping.get(purl) {
            return Some(ctx);
        }
    }
    mapping.get(&component.name)
}

fn into_context(entry: RawContextEntry) -> ServiceContext {
    ServiceContext {
        service: entry.service.unwrap_or_else(|| "unknown".to_string()),
        environment: entry.environment.unwrap_or_else(|| "dev".to_string()),
        internet_exposed: entry.internet_exposed.unwrap_or(false),
        data_class: data_class_list(entry.data_class),
        value_metric: entry.value_metric.unwrap_or_else(|| "medium".to_string()),
        exposure: entry.exposure.unwrap_or_default(),
    }
}

fn data_class_list(raw: Option<Value>) -> Vec<String> {
    match raw {
        Some(Value::String(label)) => vec![label],
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(label) => Some(label),
                other => Some(other.to_string()),
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

    fn write_context(content: &str) -> (TempDir, BTreeMap<String, ServiceContext>) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("context.json");
        fs::write(&path, content).unwrap();
        let mapping = load_context_map(&path).unwrap();
        (dir, mapping)
    }

    #[test]
    fn loads_entries_keyed_by_purl_then_name() {
        let (_dir, mapping) = write_context(
            r#"[
                {
                    "component_purl": "pkg:npm/lodash@4.17.20",
                    "service": "checkout",
                    "environment": "prod",
                    "internet_exposed": true,
                    "data_class": ["pii"],
                    "value_metric": "high",
                    "exposure": {"internet": true}
                },
                {"component_name": "left-pad", "service": "frontend"},
                {"service": "orphan-without-key"}
            ]"#,
        );

        assert_eq!(mapping.len(), 2);
        let checkout = &mapping["pkg:npm/lodash@4.17.20"];
        assert_eq!(checkout.service, "checkout");
        assert_eq!(checkout.environment, "prod");
        assert!(checkout.internet_exposed);
        assert_eq!(checkout.data_class, vec!["pii"]);

        let frontend = &mapping["left-pad"];
        assert_eq!(frontend.service, "frontend");
        // Defaults fill the gaps.
        assert_eq!(frontend.environment, "dev");
        assert_eq!(frontend.value_metric, "medium");
    }

    #[test]
    fn scalar_data_class_becomes_single_entry() {
        let (_dir, mapping) =
            write_context(r#"[{"component_name": "x", "data_class": "general"}]"#);
        assert_eq!(mapping["x"].data_class, vec!["general"]);
    }

    #[test]
    fn resolve_prefers_purl_over_name() {
        let (_dir, mapping) = write_context(
            r#"[
                {"component_purl": "pkg:npm/x@1.0.0", "service": "by-purl"},
                {"component_name": "x", "service": "by-name"}
            ]"#,
        );
        let component = Component {
            name: "x".to_string(),
            purl: Some("pkg:npm/x@1.0.0".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve(&mapping, &component).unwrap().service, "by-purl");

        let nameless_purl = Component {
            name: "x".to_string(),
            purl: Some("pkg:npm/other@2.0.0".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve(&mapping, &nameless_purl).unwrap().service,
            "by-name"
        );

        let unknown = Component {
            name: "y".to_string(),
            ..Default::default()
        };
        assert!(resolve(&mapping, &unknown).is_none());
    }
}
