//! `sbomguard scan` - run the full pipeline against a project or SBOM.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};

use sbomguard_core::{sbom, SbomguardConfig};
use sbomguard_scanner::context_gen::generate_context_file;
use sbomguard_scanner::ScanPipeline;
use sbomguard_threat_intel::{KevCache, KevClient};

pub async fn run(
    config: SbomguardConfig,
    path: Option<PathBuf>,
    sbom_path: Option<PathBuf>,
    project: &str,
    context: Option<PathBuf>,
    offline: bool,
) -> Result<()> {
    if path.is_none() && sbom_path.is_none() {
        bail!("provide either a project path or --sbom <path>");
    }

    // Keep a generated SBOM alive until the scan finishes.
    let mut temp_sbom: Option<tempfile::NamedTempFile> = None;
    let sbom_path = match sbom_path {
        Some(path) => path,
        None => {
            let Some(project_dir) = path.as_deref() else {
                bail!("a project path is required when generating an SBOM automatically");
            };
            let file = generate_sbom_with_syft(&config, project_dir)?;
            let generated = file.path().to_path_buf();
            temp_sbom = Some(file);
            generated
        }
    };

    let context = match context {
        Some(path) => path,
        None => {
            let components = sbom::load_components(&sbom_path)?;
            let generated = generate_context_file(
                &components,
                path.as_deref(),
                project,
                &config.cache_dir.join("generated_contexts"),
            )?;
            println!("generated context file: {}", generated.display());
            generated
        }
    };

    let cache = KevCache::under(&config.cache_dir);
    let mut kev = KevClient::new(config.threat_intel.clone(), cache)?;
    let mut pipeline = ScanPipeline::new(config)?;

    println!("scanning SBOM: {}", sbom_path.display());
    let outcome = pipeline
        .run(&sbom_path, project, Some(&context), offline, Some(&mut kev))
        .await?;

    println!(
        "project={} components={} vulns={} threats={}",
        outcome.project, outcome.component_count, outcome.vulnerability_count, outcome.threat_count
    );
    println!("json report: {}", outcome.json_report.display());
    println!("html report: {}", outcome.html_report.display());

    drop(temp_sbom);
    Ok(())
}

/// Generate a CycloneDX SBOM for a project tree using syft.
fn generate_sbom_with_syft(
    config: &SbomguardConfig,
    project_dir: &Path,
) -> Result<tempfile::NamedTempFile> {
    println!("generating SBOM with syft...");
    let output = Command::new(&config.scanner.syft_binary)
        .arg(project_dir)
        .args(["-o", "cyclonedx-json"])
        .output()
        .context("running syft; install syft or provide --sbom <path>")?;

    if !output.status.success() {
        bail!(
            "syft failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let mut file = tempfile::Builder::new().suffix(".json").tempfile()?;
    file.write_all(&output.stdout)?;
    file.flush()?;
    Ok(file)
}
