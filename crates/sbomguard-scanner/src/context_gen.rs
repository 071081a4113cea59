//! Application-profile inference and generated context files.
//!
//! When no context file is supplied, a coarse profile is inferred from the
//! project's package manifests and the SBOM's purl ecosystems, then written
//! out in the same format `load_context_map` reads.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::debug;

use sbomguard_core::model::Component;

/// Coarse traits inferred for the scanned application.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationProfile {
    pub service_name: String,
    pub environment: String,
    pub internet_exposed: bool,
    pub data_class: Vec<String>,
    pub value_metric: String,
}

/// npm packages that indicate a network-facing service.
const NODE_SERVER_HINTS: &[&str] = &[
    "express", "fastify", "koa", "hapi", "restify", "next", "nuxt", "@nestjs/core",
];

/// npm packages that indicate access to sensitive data stores.
const DATA_ACCESS_HINTS: &[&str] = &[
    "pg",
    "mysql",
    "mongoose",
    "redis",
    "@aws-sdk/client-dynamodb",
    "dynamodb",
    "@prisma/client",
];

const PY_SERVER_HINTS: &[&str] = &["flask", "django", "fastapi", "uvicorn"];

const PY_DATA_HINTS: &[&str] = &["sqlalchemy", "psycopg2", "psycopg2-binary", "django", "boto3"];

/// Infer an application profile from the project tree and SBOM components.
///
/// Falls back to conservative defaults when the project footprint cannot
/// be determined.
pub fn detect_application_profile(
    project_dir: Option<&Path>,
    project_name: &str,
    components: &[Component],
) -> ApplicationProfile {
    let default_service = if !project_name.is_empty() {
        project_name.to_string()
    } else {
        project_dir
            .and_then(|dir| dir.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "default-service".to_string())
    };

    let mut profile = ApplicationProfile {
        service_name: default_service,
        environment: "prod".to_string(),
        internet_exposed: false,
        data_class: vec!["general".to_string()],
        value_metric: "medium".to_string(),
    };

    let ecosystems = infer_ecosystems(components);
    if ecosystems.contains("npm") {
        profile.internet_exposed = true;
        profile.value_metric = "high".to_string();
    }
    if ecosystems.contains("pypi") {
        profile.data_class = vec!["pii".to_string()];
        profile.value_metric = "high".to_string();
    }

    let Some(project_dir) = project_dir else {
        return profile;
    };

    if let Some(dependencies) = load_node_dependencies(project_dir, &mut profile) {
        if dependencies.iter().any(|dep| NODE_SERVER_HINTS.contains(&dep.as_str())) {
            profile.internet_exposed = true;
            profile.value_metric = "high".to_string();
        }
        if dependencies.iter().any(|dep| DATA_ACCESS_HINTS.contains(&dep.as_str())) {
            profile.data_class = vec!["pii".to_string()];
            profile.value_metric = "high".to_string();
        }
        if !dependencies.is_empty() {
            return profile;
        }
    }

    let python_packages = collect_python_packages(project_dir);
    if !python_packages.is_empty() && ecosystems.is_empty() {
        if python_packages.iter().any(|pkg| PY_SERVER_HINTS.contains(&pkg.as_str())) {
            profile.internet_exposed = true;
            profile.value_metric = "high".to_string();
        }
        if python_packages.iter().any(|pkg| PY_DATA_HINTS.contains(&pkg.as_str())) {
            profile.data_class = vec!["pii".to_string()];
            profile.value_metric = "high".to_string();
        }
    }

    profile
}

/// Write a generated context file for the given components; returns its
/// path.
pub fn generate_context_file(
    components: &[Component],
    project_dir: Option<&Path>,
    project_name: &str,
    output_dir: &Path,
) -> Result<PathBuf> {
    let profile = detect_application_profile(project_dir, project_name, components);
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let safe_service = {
        let name = profile.service_name.replace(' ', "-");
        if name.is_empty() {
            "service".to_string()
        } else {
            name
        }
    };
    let output_path = output_dir.join(format!("{safe_service}_context.generated.json"));

    let entries: Vec<Value> = components
        .iter()
        .map(|component| {
            json!({
                "component_name": component.name,
                "component_purl": component.purl,
                "service": profile.service_name,
                "environment": profile.environment,
                "internet_exposed": profile.internet_exposed,
                "data_class": profile.data_class,
                "value_metric": profile.value_metric,
                "exposure": {"internet": profile.internet_exposed},
            })
        })
        .collect();

    std::fs::write(&output_path, serde_json::to_string_pretty(&entries)?)
        .with_context(|| format!("writing {}", output_path.display()))?;
    debug!(path = %output_path.display(), components = entries.len(), "generated context file");
    Ok(output_path)
}

fn infer_ecosystems(components: &[Component]) -> BTreeSet<String> {
    let mut ecosystems = BTreeSet::new();
    for component in components {
        let Some(purl) = component.purl.as_deref() else {
            continue;
        };
        let purl = purl.to_lowercase();
        if purl.starts_with("pkg:npm/") {
            ecosystems.insert("npm".to_string());
        } else if purl.starts_with("pkg:pypi/") || purl.starts_with("pkg:python/") {
            ecosystems.insert("pypi".to_string());
        } else if purl.starts_with("pkg:golang/") {
            ecosystems.insert("golang".to_string());
        }
    }
    ecosystems
}

/// Read top-level package.json dependencies, updating the service name
/// from the manifest. Returns `None` if there is no readable manifest.
fn load_node_dependencies(
    project_dir: &Path,
    profile: &mut ApplicationProfile,
) -> Option<BTreeSet<String>> {
    let manifest_path = project_dir.join("package.json");
    let text = std::fs::read_to_string(&manifest_path).ok()?;
    let manifest: Value = serde_json::from_str(&text).ok()?;

    if let Some(name) = manifest.get("name").and_then(Value::as_str) {
        let name = name.trim();
        if !name.is_empty() {
            profile.service_name = name.to_string();
        }
    }

    let mut dependencies = BTreeSet::new();
    for key in ["dependencies", "devDependencies", "peerDependencies"] {
        if let Some(section) = manifest.get(key).and_then(Value::as_object) {
            for dep in section.keys() {
                dependencies.insert(dep.to_lowercase());
            }
        }
    }
    Some(dependencies)
}

fn collect_python_packages(project_dir: &Path) -> BTreeSet<String> {
    let mut packages = BTreeSet::new();
    let requirements_path = project_dir.join("requirements.txt");
    let Ok(text) = std::fs::read_to_string(&requirements_path) else {
        return packages;
    };
    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let name = line
            .split(['<', '>', '='])
            .next()
            .unwrap_or(line)
            .trim()
            .to_lowercase();
        if !name.is_empty() {
            packages.insert(name);
        }
    }
    packages
}
