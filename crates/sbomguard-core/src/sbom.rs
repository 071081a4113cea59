//! CycloneDX SBOM ingestion.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::model::Component;

/// Wire format of the CycloneDX fields we consume.
#[derive(Debug, Deserialize)]
struct CycloneDxBom {
    #[serde(default)]
    components: Vec<RawComponent>,
}

#[derive(Debug, Deserialize)]
struct RawComponent {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    purl: Option<String>,
    /// Either a plain string or a CycloneDX supplier object with a `name`.
    #[serde(default)]
    supplier: Option<Value>,
    #[serde(default)]
    hashes: Vec<RawHash>,
    #[serde(default)]
    properties: Vec<RawProperty>,
}

#[derive(Debug, Deserialize)]
struct RawHash {
    #[serde(default, alias = "algorithm")]
    alg: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawProperty {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

/// Load all components from a CycloneDX JSON SBOM file.
pub fn load_components(path: &Path) -> Result<Vec<Component>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading SBOM {}", path.display()))?;
    let bom: CycloneDxBom = serde_json::from_str(&text)
        .with_context(|| format!("parsing SBOM {}", path.display()))?;
    Ok(bom.components.into_iter().map(into_component).collect())
}

fn into_component(raw: RawComponent) -> Component {
    let hashes: BTreeMap<String, String> = raw
        .hashes
        .into_iter()
        .filter_map(|hash| Some((hash.alg?, hash.content?)))
        .collect();
    let properties: BTreeMap<String, String> = raw
        .properties
        .into_iter()
        .filter_map(|prop| Some((prop.name?, prop.value?)))
        .collect();

    Component {
        name: raw.name.unwrap_or_else(|| "unknown".to_string()),
        version: raw.version,
        purl: raw.purl,
        supplier: raw.supplier.as_ref().and_then(supplier_name),
        hashes,
        properties,
    }
}

fn supplier_name(supplier: &Value) -> Option<String> {
    match supplier {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}
