//! `sbomguard rules` - list the loaded rule catalog.

use anyhow::Result;

use sbomguard_core::{CorrelationEngine, SbomguardConfig};

pub fn run(config: &SbomguardConfig) -> Result<()> {
    let engine = CorrelationEngine::from_directory(&config.rules_dir)?;

    if engine.rules().is_empty() {
        println!("No rules loaded from {}", config.rules_dir.display());
        return Ok(());
    }

    println!("Rules from {}:", config.rules_dir.display());
    println!();
    println!("  {:<28} {:<10} DESCRIPTION", "ID", "SEVERITY");
    println!("  {}", "-".repeat(72));
    for rule in engine.rules() {
        println!(
            "  {:<28} {:<10} {}",
            rule.id,
            rule.severity.to_string(),
            rule.description
        );
    }
    println!();
    println!("  {} rule(s) loaded", engine.rules().len());

    Ok(())
}
