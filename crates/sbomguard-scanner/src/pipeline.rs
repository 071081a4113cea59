//! The scan pipeline: SBOM in, scored threats out.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, warn};

use sbomguard_core::assemble::assemble;
use sbomguard_core::config::SbomguardConfig;
use sbomguard_core::context::{load_context_map, resolve};
use sbomguard_core::model::{Component, ScoredThreat, ServiceContext};
use sbomguard_core::sbom::load_components;
use sbomguard_core::scoring::compute_score;
use sbomguard_core::CorrelationEngine;
use sbomguard_threat_intel::enrich::annotation_for;
use sbomguard_threat_intel::{KevClient, KevSnapshot};

use crate::report::{write_html_report, write_json_report};
use crate::storage::ThreatStore;
use crate::trivy::{extract_vulnerabilities, vulnerabilities_for_component, TrivyScanner};

/// Summary of one completed scan run.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub project: String,
    pub component_count: usize,
    pub vulnerability_count: usize,
    pub threat_count: usize,
    pub json_report: PathBuf,
    pub html_report: PathBuf,
}

/// Orchestrates load, scan, enrich, correlate, score, persist, report.
pub struct ScanPipeline {
    config: SbomguardConfig,
    engine: CorrelationEngine,
    store: ThreatStore,
    scanner: TrivyScanner,
}

impl ScanPipeline {
    /// Build a pipeline from configuration: loads the rule catalog and
    /// opens the threat store.
    pub fn new(config: SbomguardConfig) -> Result<Self> {
        let engine = CorrelationEngine::from_directory(&config.rules_dir)
            .with_context(|| format!("loading rules from {}", config.rules_dir.display()))?;
        let store = ThreatStore::open(&config.db_path)?;
        let scanner = TrivyScanner::from_config(&config);
        Ok(Self {
            config,
            engine,
            store,
            scanner,
        })
    }

    /// Build a pipeline from pre-constructed parts (useful for testing).
    pub fn with_parts(
        config: SbomguardConfig,
        engine: CorrelationEngine,
        store: ThreatStore,
        scanner: TrivyScanner,
    ) -> Self {
        Self {
            config,
            engine,
            store,
            scanner,
        }
    }

    /// Run a full scan of one SBOM.
    pub async fn run(
        &mut self,
        sbom_path: &Path,
        project: &str,
        context_path: Option<&Path>,
        offline: bool,
        kev: Option<&mut KevClient>,
    ) -> Result<ScanOutcome> {
        let components = load_components(sbom_path)?;
        let context_map = match context_path {
            Some(path) => load_context_map(path)?,
            None => BTreeMap::new(),
        };
        let report = self.scan_or_fallback(sbom_path, offline)?;

        // Fail-soft by construction: the client always hands back a
        // snapshot, possibly empty.
        let snapshot = match kev {
            Some(client) if self.config.threat_intel.enabled => Some(client.snapshot().await),
            _ => None,
        };

        self.process(
            &components,
            &context_map,
            &report,
            snapshot.as_ref(),
            project,
            sbom_path,
        )
    }

    fn scan_or_fallback(&self, sbom_path: &Path, offline: bool) -> Result<Value> {
        match self.scanner.scan_sbom(sbom_path, offline) {
            Ok(report) => Ok(report),
            Err(e) => {
                let fallback = self.config.cache_dir.join("sample_trivy_report.json");
                if fallback.exists() {
                    warn!("trivy scan failed ({e}), using cached sample report");
                    let text = std::fs::read_to_string(&fallback)?;
                    Ok(serde_json::from_str(&text)?)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    /// Correlate an already-parsed scanner report. Synchronous; exposed
    /// separately so the correlation path is testable without a scanner
    /// binary.
    pub fn process(
        &self,
        components: &[Component],
        context_map: &BTreeMap<String, ServiceContext>,
        report: &Value,
        snapshot: Option<&KevSnapshot>,
        project: &str,
        sbom_path: &Path,
    ) -> Result<ScanOutcome> {
        let index = extract_vulnerabilities(report);
        let scan_id = self
            .store
            .begin_scan(project, &sbom_path.to_string_lossy())?;

        let mut threats: Vec<ScoredThreat> = Vec::new();
        let mut vulnerability_count = 0usize;

        for component in components {
            let component_id = self.store.insert_component(scan_id, component)?;
            let service_context = resolve(context_map, component);

            // A component with no correlated vulnerabilities contributes
            // nothing.
            let vulns = vulnerabilities_for_component(&index, component);
            if vulns.is_empty() {
                continue;
            }

            for mut vuln in vulns {
                vulnerability_count += 1;

                let annotation = snapshot.map(|snapshot| annotation_for(snapshot, &vuln));
                if let (Some(annotation), Some(record)) = (&annotation, vuln.as_object_mut()) {
                    if let Ok(value) = serde_json::to_value(annotation) {
                        record.insert("threatintel".to_string(), value);
                    }
                }

                let vuln_id = self.store.insert_vulnerability(component_id, &vuln)?;

                for hypothesis in
                    self.engine
                        .evaluate_rules(component, &vuln, service_context, annotation.as_ref())
                {
                    // The rule's severity biases risk independent of the
                    // CVSS-driven baseline.
                    let multiplier =
                        hypothesis.pattern_multiplier * hypothesis.rule_severity.multiplier();
                    let score = compute_score(
                        &vuln,
                        service_context,
                        &hypothesis.score_factors,
                        multiplier,
                    );
                    let threat = assemble(
                        &hypothesis,
                        score,
                        component,
                        &vuln,
                        service_context,
                        annotation.as_ref(),
                    );
                    self.store.insert_threat(scan_id, vuln_id, project, &threat)?;
                    threats.push(threat);
                }
            }
        }

        let json_report = self.config.report_dir.join(format!("{project}_report.json"));
        write_json_report(&threats, &json_report)?;
        let html_report = write_html_report(&threats, project, &self.config.report_dir)?;

        info!(
            project,
            components = components.len(),
            vulnerabilities = vulnerability_count,
            threats = threats.len(),
            "scan complete"
        );

        Ok(ScanOutcome {
            project: project.to_string(),
            component_count: components.len(),
            vulnerability_count,
            threat_count: threats.len(),
            json_report,
            html_report,
        })
    }

    /// Read access to the store, used by the query API.
    pub fn store(&self) -> &ThreatStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> SbomguardConfig {
        SbomguardConfig {
            rules_dir: dir.path().join("rules"),
            report_dir: dir.path().join("reports"),
            cache_dir: dir.path().join("cache"),
            db_path: dir.path().join("db/test.sqlite"),
            ..Default::default()
        }
    }

    fn write_rule(dir: &TempDir) {
        fs::write(
            dir.path().join("rules/kev.json"),
            r#"{
                "id": "kev-listed",
                "description": "known exploited",
                "conditions": [{"threatintel.kev_listed": {"eq": true}}],
                "result": {"pattern": ["kev"], "pattern_multiplier": 1.2},
                "severity": "high"
            }"#,
        )
        .unwrap();
    }

    fn pipeline(dir: &TempDir) -> ScanPipeline {
        fs::create_dir_all(dir.path().join("rules")).unwrap();
        write_rule(dir);
        let config = test_config(dir);
        let engine = CorrelationEngine::from_directory(&config.rules_dir).unwrap();
        let store = ThreatStore::open_in_memory().unwrap();
        let scanner = TrivyScanner::from_config(&config);
        ScanPipeline::with_parts(config, engine, store, scanner)
    }

    fn kev_snapshot(cve: &str) -> KevSnapshot {
        let mut snapshot = KevSnapshot::empty(Utc::now() + Duration::hours(6));
        snapshot.cves.insert(cve.to_string());
        snapshot
    }

    fn sample_report() -> Value {
        json!({
            "Results": [{
                "Vulnerabilities": [{
                    "VulnerabilityID": "CVE-2021-23337",
                    "PkgName": "lodash",
                    "PkgIdentifier": {"PURL": "pkg:npm/lodash@4.17.20"},
                    "Severity": "HIGH",
                    "cvss": 7.2
                }]
            }]
        })
    }

    fn components() -> Vec<Component> {
        vec![
            Component {
                name: "lodash".to_string(),
                version: Some("4.17.20".to_string()),
                purl: Some("pkg:npm/lodash@4.17.20".to_string()),
                ..Default::default()
            },
            Component {
                name: "clean-package".to_string(),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn kev_listed_vulnerability_produces_a_stored_threat() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir);
        let snapshot = kev_snapshot("CVE-2021-23337");

        let outcome = pipeline
            .process(
                &components(),
                &BTreeMap::new(),
                &sample_report(),
                Some(&snapshot),
                "alpha",
                Path::new("bom.json"),
            )
            .unwrap();

        assert_eq!(outcome.component_count, 2);
        assert_eq!(outcome.vulnerability_count, 1);
        assert_eq!(outcome.threat_count, 1);
        assert!(outcome.json_report.exists());
        assert!(outcome.html_report.exists());

        let stored = pipeline.store().list_threats(Some("alpha")).unwrap();
        assert_eq!(stored.len(), 1);
        let threat = &stored[0].threat;
        assert_eq!(threat.rule_id, "kev-listed");
        assert_eq!(threat.evidence.cve.as_deref(), Some("CVE-2021-23337"));
        assert!(threat.evidence.intel.as_ref().unwrap().kev_listed);
        assert!(threat.score > 0.0 && threat.score <= 100.0);
    }

    #[test]
    fn unlisted_vulnerability_produces_no_threats() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir);
        let snapshot = kev_snapshot("CVE-2000-0000");

        let outcome = pipeline
            .process(
                &components(),
                &BTreeMap::new(),
                &sample_report(),
                Some(&snapshot),
                "alpha",
                Path::new("bom.json"),
            )
            .unwrap();

        assert_eq!(outcome.vulnerability_count, 1);
        assert_eq!(outcome.threat_count, 0);
    }

    #[test]
    fn components_without_vulnerabilities_contribute_nothing() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir);

        let outcome = pipeline
            .process(
                &components(),
                &BTreeMap::new(),
                &json!({}),
                None,
                "alpha",
                Path::new("bom.json"),
            )
            .unwrap();

        assert_eq!(outcome.vulnerability_count, 0);
        assert_eq!(outcome.threat_count, 0);
        assert!(pipeline.store().list_threats(None).unwrap().is_empty());
    }

    #[test]
    fn context_flows_into_the_threat_target() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir);
        let snapshot = kev_snapshot("CVE-2021-23337");

        let mut context_map = BTreeMap::new();
        context_map.insert(
            "pkg:npm/lodash@4.17.20".to_string(),
            ServiceContext {
                service: "checkout".to_string(),
                value_metric: "high".to_string(),
                internet_exposed: true,
                ..Default::default()
            },
        );

        let outcome = pipeline
            .process(
                &components(),
                &context_map,
                &sample_report(),
                Some(&snapshot),
                "alpha",
                Path::new("bom.json"),
            )
            .unwrap();
        assert_eq!(outcome.threat_count, 1);

        let stored = pipeline.store().list_threats(Some("alpha")).unwrap();
        assert_eq!(stored[0].threat.target.service, "checkout");
        assert_eq!(stored[0].threat.value.value_metric, "high");
    }
}
