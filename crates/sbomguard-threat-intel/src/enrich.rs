//! Vulnerability enrichment with KEV annotations.

use serde_json::Value;

use sbomguard_core::model::IntelAnnotation;

use crate::types::KevSnapshot;

/// Source label attached to KEV-listed vulnerabilities.
const KEV_SOURCE: &str = "CISA KEV";

/// Chatter scores for listed vs. unlisted vulnerabilities.
const CHATTER_LISTED: f64 = 0.9;
const CHATTER_UNLISTED: f64 = 0.1;

/// Build the annotation for one vulnerability record.
pub fn annotation_for(snapshot: &KevSnapshot, vuln: &Value) -> IntelAnnotation {
    let kev_listed = resolve_cve_id(vuln)
        .map(|cve| snapshot.contains(&cve))
        .unwrap_or(false);
    IntelAnnotation {
        kev_listed,
        chatter_score: if kev_listed {
            CHATTER_LISTED
        } else {
            CHATTER_UNLISTED
        },
        sources: if kev_listed {
            vec![KEV_SOURCE.to_string()]
        } else {
            Vec::new()
        },
    }
}

/// Attach a `threatintel` annotation to every vulnerability in place.
///
/// Existing `threatintel` keys are overwritten with the fresh annotation;
/// non-object entries are left untouched.
pub fn annotate_vulnerabilities(snapshot: &KevSnapshot, vulns: &mut [Value]) {
    for vuln in vulns {
        let annotation = annotation_for(snapshot, vuln);
        if let Some(record) = vuln.as_object_mut() {
            if let Ok(annotation) = serde_json::to_value(&annotation) {
                record.insert("threatintel".to_string(), annotation);
            }
        }
    }
}

/// Extract the best CVE identifier from a scanner-shaped record.
fn resolve_cve_id(vuln: &Value) -> Option<String> {
    ["VulnerabilityID", "vulnerability_id", "CVE", "cve", "id"]
        .iter()
        .find_map(|key| vuln.get(*key))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_uppercase)
}
