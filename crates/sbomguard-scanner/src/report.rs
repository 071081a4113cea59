//! JSON and HTML report writers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;

use sbomguard_core::model::ScoredThreat;

/// Write the machine-readable report.
pub fn write_json_report(threats: &[ScoredThreat], output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let payload = json!({
        "generated_at": Utc::now().to_rfc3339(),
        "threats": threats,
    });
    let data = serde_json::to_string_pretty(&payload)?;
    std::fs::write(output_path, data)
        .with_context(|| format!("writing report {}", output_path.display()))?;
    Ok(())
}

/// Write a self-contained HTML report and return its path.
pub fn write_html_report(
    threats: &[ScoredThreat],
    project: &str,
    report_dir: &Path,
) -> Result<PathBuf> {
    std::fs::create_dir_all(report_dir)?;
    let output_path = report_dir.join(format!("{project}_report.html"));
    let rendered = render_html(threats, project);
    std::fs::write(&output_path, rendered)
        .with_context(|| format!("writing report {}", output_path.display()))?;
    Ok(output_path)
}

fn render_html(threats: &[ScoredThreat], project: &str) -> String {
    let mut rows = String::new();
    for threat in threats {
        let cve = threat.evidence.cve.as_deref().unwrap_or("-");
        let severity = threat.evidence.severity.as_deref().unwrap_or("-");
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.2}</td><td>{}</td></tr>\n",
            escape(&threat.rule_id),
            escape(&threat.target.service),
            escape(&threat.target.component.name),
            escape(cve),
            escape(severity),
            threat.score,
            escape(&threat.status),
        ));
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Threat report: {project}</title>\n\
         <style>\n\
         body {{ font-family: sans-serif; margin: 2rem; }}\n\
         table {{ border-collapse: collapse; width: 100%; }}\n\
         th, td {{ border: 1px solid #ccc; padding: 0.4rem 0.6rem; text-align: left; }}\n\
         th {{ background: #f0f0f0; }}\n\
         </style>\n</head>\n<body>\n\
         <h1>Threat report: {project}</h1>\n\
         <p>Generated {generated} &mdash; {count} threat(s)</p>\n\
         <table>\n\
         <tr><th>Rule</th><th>Service</th><th>Component</th><th>CVE</th>\
         <th>Severity</th><th>Score</th><th>Status</th></tr>\n\
         {rows}\
         </table>\n</body>\n</html>\n",
        project = escape(project),
        generated = Utc::now().to_rfc3339(),
        count = threats.len(),
        rows = rows,
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
