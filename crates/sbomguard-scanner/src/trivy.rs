//! Adapter around the Trivy binary and its JSON report format.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use sbomguard_core::config::SbomguardConfig;
use sbomguard_core::model::Component;

#[derive(Debug, Error)]
pub enum TrivyError {
    #[error("trivy binary not found; install trivy or set scanner.trivy_binary")]
    BinaryMissing,

    #[error("trivy scan failed: {0}")]
    ScanFailed(String),

    #[error("invalid trivy output: {0}")]
    InvalidOutput(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Vulnerabilities indexed by (package purl, package name).
pub type VulnIndex = HashMap<(Option<String>, Option<String>), Vec<Value>>;

/// Invokes `trivy sbom` and parses the report.
#[derive(Debug, Clone)]
pub struct TrivyScanner {
    binary: String,
    cache_dir: PathBuf,
    offline: bool,
}

impl TrivyScanner {
    pub fn new(binary: String, cache_dir: PathBuf, offline: bool) -> Self {
        Self {
            binary,
            cache_dir,
            offline,
        }
    }

    pub fn from_config(config: &SbomguardConfig) -> Self {
        Self::new(
            config.scanner.trivy_binary.clone(),
            config.cache_dir.clone(),
            config.scanner.offline,
        )
    }

    /// Scan an SBOM file and return the raw JSON report.
    ///
    /// Trivy exits 0 on clean scans and 1 when findings exist; both are
    /// success here.
    pub fn scan_sbom(&self, sbom_path: &Path, offline: bool) -> Result<Value, TrivyError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("sbom")
            .arg(sbom_path)
            .args(["-f", "json"])
            .env("TRIVY_CACHE_DIR", &self.cache_dir);
        if offline || self.offline {
            cmd.arg("--offline-scan");
        }

        debug!(binary = %self.binary, sbom = %sbom_path.display(), "invoking trivy");
        let output = cmd.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TrivyError::BinaryMissing
            } else {
                TrivyError::Io(e)
            }
        })?;

        let code = output.status.code().unwrap_or(-1);
        if code != 0 && code != 1 {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                "trivy scan failed".to_string()
            } else {
                stderr
            };
            return Err(TrivyError::ScanFailed(message));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let body = if stdout.trim().is_empty() {
            "{}"
        } else {
            stdout.as_ref()
        };
        Ok(serde_json::from_str(body)?)
    }
}

/// Index every vulnerability in a report by (purl, package name).
pub fn extract_vulnerabilities(report: &Value) -> VulnIndex {
    let mut index: VulnIndex = HashMap::new();
    let results = report
        .get("Results")
        .or_else(|| report.get("results"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for result in &results {
        let vulns = result
            .get("Vulnerabilities")
            .or_else(|| result.get("vulnerabilities"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for vuln in vulns {
            let purl = vuln
                .get("PkgIdentifier")
                .and_then(|id| id.get("PURL"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let name = vuln
                .get("PkgName")
                .or_else(|| vuln.get("packageName"))
                .and_then(Value::as_str)
                .map(str::to_string);
            index.entry((purl, name)).or_default().push(vuln);
        }
    }
    index
}

/// Look up the vulnerabilities correlated with one component.
pub fn vulnerabilities_for_component(index: &VulnIndex, component: &Component) -> Vec<Value> {
    index
        .get(&(component.purl.clone(), Some(component.name.clone())))
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_report() -> Value {
        json!({
            "Results": [
                {
                    "Target": "package-lock.json",
                    "Vulnerabilities": [
                        {
                            "VulnerabilityID": "CVE-2021-23337",
                            "PkgName": "lodash",
                            "PkgIdentifier": {"PURL": "pkg:npm/lodash@4.17.20"},
                            "Severity": "HIGH"
                        },
                        {
                            "VulnerabilityID": "CVE-2020-8203",
                            "PkgName": "lodash",
                            "PkgIdentifier": {"PURL": "pkg:npm/lodash@4.17.20"},
                            "Severity": "MEDIUM"
                        },
                        {
                            "VulnerabilityID": "CVE-2022-0001",
                            "PkgName": "minimist",
                            "Severity": "LOW"
                        }
                    ]
                }
            ]
        })
    }

    #[test]
    fn indexes_by_purl_and_name() {
        let index = extract_vulnerabilities(&sample_report());
        assert_eq!(index.len(), 2);

        let lodash = Component {
            name: "lodash".to_string(),
            purl: Some("pkg:npm/lodash@4.17.20".to_string()),
            ..Default::default()
        };
        let vulns = vulnerabilities_for_component(&index, &lodash);
        assert_eq!(vulns.len(), 2);
        assert_eq!(vulns[0]["VulnerabilityID"], json!("CVE-2021-23337"));
    }

    #[test]
    fn component_without_purl_matches_purlless_entries() {
        let index = extract_vulnerabilities(&sample_report());
        let minimist = Component {
            name: "minimist".to_string(),
            ..Default::default()
        };
        assert_eq!(vulnerabilities_for_component(&index, &minimist).len(), 1);
    }

    #[test]
    fn unknown_component_has_no_vulnerabilities() {
        let index = extract_vulnerabilities(&sample_report());
        let unknown = Component {
            name: "left-pad".to_string(),
            ..Default::default()
        };
        assert!(vulnerabilities_for_component(&index, &unknown).is_empty());
    }

    #[test]
    fn lowercase_report_shape_is_accepted() {
        let report = json!({
            "results": [
                {"vulnerabilities": [{"packageName": "x", "VulnerabilityID": "CVE-1"}]}
            ]
        });
        let index = extract_vulnerabilities(&report);
        let x = Component {
            name: "x".to_string(),
            ..Default::default()
        };
        assert_eq!(vulnerabilities_for_component(&index, &x).len(), 1);
    }

    #[test]
    fn empty_report_yields_empty_index() {
        assert!(extract_vulnerabilities(&json!({})).is_empty());
    }

    #[test]
    fn missing_binary_is_a_distinct_error() {
        let scanner = TrivyScanner::new(
            "definitely-not-a-real-binary-name".to_string(),
            std::env::temp_dir(),
            true,
        );
        let err = scanner
            .scan_sbom(Path::new("/nonexistent/bom.json"), true)
            .unwrap_err();
        assert!(matches!(err, TrivyError::BinaryMissing));
    }
}
