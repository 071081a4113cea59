//! End-to-end correlation: load a catalog from disk, evaluate, score,
//! assemble.

use std::collections::BTreeMap;
use std::fs;

use serde_json::json;
use tempfile::TempDir;

use sbomguard_core::assemble::assemble;
use sbomguard_core::model::{Component, IntelAnnotation, ServiceContext};
use sbomguard_core::scoring::compute_score;
use sbomguard_core::CorrelationEngine;

fn write_catalog(dir: &TempDir) {
    fs::write(
        dir.path().join("10_kev.json"),
        r#"{
            "rule_id": "kev-listed",
            "title": "Known exploited vulnerability",
            "description": "listed in the KEV catalog",
            "condition": {"threatintel.kev_listed": {"eq": true}},
            "tags": ["kev"],
            "remediation": "patch immediately",
            "severity": "high"
        }"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("20_exposed.json"),
        r#"{
            "id": "exposed-high-cvss",
            "description": "high CVSS on an internet-exposed service",
            "conditions": [
                {"vuln.cvss": {"gte": 7.0}},
                {"context.internet_exposed": {"eq": true}}
            ],
            "result": {
                "pattern": ["remote-exploitation"],
                "objective": ["initial-access"],
                "recommendations": [{"type": "patch", "detail": "upgrade the package"}],
                "pattern_multiplier": 1.2
            },
            "score_factors": {"cvss_weight": 0.6, "exploitability_weight": 0.2},
            "severity": "medium"
        }"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("30_disabled.json"),
        r#"{"id": "disabled-catchall", "enabled": false, "conditions": [{}]}"#,
    )
    .unwrap();
}

fn component() -> Component {
    Component {
        name: "lodash".to_string(),
        version: Some("4.17.20".to_string()),
        purl: Some("pkg:npm/lodash@4.17.20".to_string()),
        ..Default::default()
    }
}

fn exposed_context() -> ServiceContext {
    ServiceContext {
        service: "checkout".to_string(),
        environment: "prod".to_string(),
        internet_exposed: true,
        data_class: vec!["pii".to_string()],
        value_metric: "high".to_string(),
        ..Default::default()
    }
}

#[test]
fn full_match_flows_through_scoring_and_assembly() {
    let dir = TempDir::new().unwrap();
    write_catalog(&dir);
    let engine = CorrelationEngine::from_directory(dir.path()).unwrap();
    assert_eq!(engine.rules().len(), 2); // disabled rule is gone

    let component = component();
    let context = exposed_context();
    let intel = IntelAnnotation {
        kev_listed: true,
        chatter_score: 0.9,
        sources: vec!["CISA KEV".to_string()],
    };
    let vuln = json!({
        "VulnerabilityID": "CVE-2021-23337",
        "Severity": "HIGH",
        "cvss": 7.2,
        "exploit_maturity": "ACTIVE",
    });

    let hypotheses = engine.evaluate_rules(&component, &vuln, Some(&context), Some(&intel));
    let ids: Vec<_> = hypotheses.iter().map(|h| h.rule_id.as_str()).collect();
    assert_eq!(ids, vec!["kev-listed", "exposed-high-cvss"]);

    for hypothesis in &hypotheses {
        let multiplier = hypothesis.pattern_multiplier * hypothesis.rule_severity.multiplier();
        let score = compute_score(&vuln, Some(&context), &hypothesis.score_factors, multiplier);
        assert!((0.0..=100.0).contains(&score));

        let threat = assemble(
            hypothesis,
            score,
            &component,
            &vuln,
            Some(&context),
            Some(&intel),
        );
        assert_eq!(threat.status, "open");
        assert_eq!(threat.target.service, "checkout");
        assert_eq!(threat.evidence.cve.as_deref(), Some("CVE-2021-23337"));
        assert_eq!(threat.evidence.cvss, Some(7.2));
        assert!(threat.evidence.intel.as_ref().unwrap().kev_listed);
    }

    // The shorthand rule synthesized its result from tags and remediation.
    let kev = &hypotheses[0];
    assert_eq!(kev.pattern, vec!["kev"]);
    assert_eq!(kev.recommendations.len(), 1);
}

#[test]
fn no_matching_rules_yield_no_hypotheses() {
    let dir = TempDir::new().unwrap();
    write_catalog(&dir);
    let engine = CorrelationEngine::from_directory(dir.path()).unwrap();

    // Not KEV-listed, low CVSS, not exposed: nothing fires.
    let component = component();
    let vuln = json!({"cvss": 2.0});
    let hypotheses = engine.evaluate_rules(&component, &vuln, None, None);
    assert!(hypotheses.is_empty());
}

#[test]
fn disabled_rule_never_fires_even_though_vacuous() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("only.json"),
        r#"{"id": "catchall", "enabled": false, "conditions": [{}]}"#,
    )
    .unwrap();
    let engine = CorrelationEngine::from_directory(dir.path()).unwrap();

    let component = component();
    let hypotheses = engine.evaluate_rules(&component, &json!({}), None, None);
    assert!(hypotheses.is_empty());
}

#[test]
fn identical_inputs_produce_identical_sequences() {
    let dir = TempDir::new().unwrap();
    write_catalog(&dir);

    let component = component();
    let context = exposed_context();
    let vuln = json!({"cvss": 8.0});

    let run = || {
        let engine = CorrelationEngine::from_directory(dir.path()).unwrap();
        engine
            .evaluate_rules(&component, &vuln, Some(&context), None)
            .iter()
            .map(|h| h.rule_id.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn scoring_folds_the_severity_multiplier() {
    let vuln = json!({"cvss": 8.0, "exploit_maturity": "PROOF_OF_CONCEPT"});
    let context = ServiceContext {
        value_metric: "high".to_string(),
        exposure: sbomguard_core::model::ExposureProfile {
            internet: Some(sbomguard_core::model::ExposureLevel::Level(1.0)),
        },
        ..Default::default()
    };
    let factors: BTreeMap<String, f64> = [
        ("cvss_weight".to_string(), 0.5),
        ("exploitability_weight".to_string(), 0.3),
        ("asset_value_weight".to_string(), 0.15),
        ("exposure_weight".to_string(), 0.05),
    ]
    .into();

    // pattern_multiplier 1.0 folded with a high-severity rule (1.2).
    let score = compute_score(&vuln, Some(&context), &factors, 1.0 * 1.2);
    assert_eq!(score, 93.6);
}
