//! Command-line interface for sbomguard.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sbomguard_core::SbomguardConfig;

/// sbomguard - SBOM threat modelling.
#[derive(Parser, Debug)]
#[command(name = "sbomguard", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "sbomguard.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a project or SBOM and produce scored threats.
    Scan {
        /// Project directory to generate an SBOM from (via syft).
        path: Option<PathBuf>,

        /// Path to an existing CycloneDX SBOM file.
        #[arg(long)]
        sbom: Option<PathBuf>,

        /// Project identifier.
        #[arg(short, long, default_value = "default")]
        project: String,

        /// Service context mapping JSON (generated when omitted).
        #[arg(long)]
        context: Option<PathBuf>,

        /// Use Trivy offline scan mode.
        #[arg(long)]
        offline: bool,
    },

    /// List the loaded rule catalog.
    Rules,

    /// Serve the read-only threat query API.
    Serve {
        /// Bind host (defaults to the configured api.host).
        #[arg(long)]
        host: Option<String>,

        /// Bind port (defaults to the configured api.port).
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_env("SBOMGUARD_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = SbomguardConfig::load(&cli.config)?;

    match cli.command {
        Commands::Scan {
            path,
            sbom,
            project,
            context,
            offline,
        } => commands::scan::run(config, path, sbom, &project, context, offline).await,
        Commands::Rules => commands::rules::run(&config),
        Commands::Serve { host, port } => commands::serve::run(config, host, port).await,
    }
}
