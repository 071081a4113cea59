//! Application settings and TOML configuration parsing.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Top-level sbomguard configuration, loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SbomguardConfig {
    /// Directory containing JSON rule files.
    #[serde(default = "default_rules_dir")]
    pub rules_dir: PathBuf,

    /// Directory where JSON/HTML reports are written.
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,

    /// Directory for scanner and feed caches.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Path to the SQLite threat database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// External scanner settings.
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Threat intelligence feed settings.
    #[serde(default)]
    pub threat_intel: FeedConfig,

    /// Read-only query API settings.
    #[serde(default)]
    pub api: ApiConfig,
}

/// Settings for the external SBOM/vulnerability scanner binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Trivy binary name or path.
    #[serde(default = "default_trivy_binary")]
    pub trivy_binary: String,
    /// Syft binary name or path, used to generate SBOMs from project trees.
    #[serde(default = "default_syft_binary")]
    pub syft_binary: String,
    /// Pass `--offline-scan` to Trivy.
    #[serde(default)]
    pub offline: bool,
}

fn default_trivy_binary() -> String {
    "trivy".to_string()
}

fn default_syft_binary() -> String {
    "syft".to_string()
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            trivy_binary: default_trivy_binary(),
            syft_binary: default_syft_binary(),
            offline: false,
        }
    }
}

/// Threat intelligence feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Whether KEV enrichment is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// URL of the known-exploited-vulnerabilities feed.
    #[serde(default = "default_kev_url")]
    pub kev_url: String,
    /// Per-request fetch timeout, in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// How long a fetched snapshot stays fresh, in hours.
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: u64,
    /// Back-off before retrying after a failed fetch, in minutes.
    #[serde(default = "default_failure_backoff_minutes")]
    pub failure_backoff_minutes: u64,
}

fn default_kev_url() -> String {
    "https://www.cisa.gov/sites/default/files/feeds/known_exploited_vulnerabilities.json"
        .to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_cache_ttl_hours() -> u64 {
    6
}

fn default_failure_backoff_minutes() -> u64 {
    15
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kev_url: default_kev_url(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            cache_ttl_hours: default_cache_ttl_hours(),
            failure_backoff_minutes: default_failure_backoff_minutes(),
        }
    }
}

/// Query API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    8000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

// --- Default value functions ---

fn default_rules_dir() -> PathBuf {
    PathBuf::from("rules")
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("data/reports")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data/cache")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("db/sbomguard.sqlite")
}

fn default_true() -> bool {
    true
}

impl Default for SbomguardConfig {
    fn default() -> Self {
        Self {
            rules_dir: default_rules_dir(),
            report_dir: default_report_dir(),
            cache_dir: default_cache_dir(),
            db_path: default_db_path(),
            scanner: ScannerConfig::default(),
            threat_intel: FeedConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl SbomguardConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// If the file does not exist, returns the default configuration.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: SbomguardConfig = toml::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = SbomguardConfig::default();
        assert_eq!(config.rules_dir, PathBuf::from("rules"));
        assert_eq!(config.scanner.trivy_binary, "trivy");
        assert!(config.threat_intel.enabled);
        assert_eq!(config.threat_intel.cache_ttl_hours, 6);
        assert_eq!(config.api.port, 8000);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let toml_str = r#"
rules_dir = "custom/rules"

[scanner]
trivy_binary = "/opt/trivy"
offline = true

[threat_intel]
fetch_timeout_secs = 3
"#;
        let config: SbomguardConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.rules_dir, PathBuf::from("custom/rules"));
        assert_eq!(config.scanner.trivy_binary, "/opt/trivy");
        assert!(config.scanner.offline);
        assert_eq!(config.threat_intel.fetch_timeout_secs, 3);
        // Untouched sections keep their defaults.
        assert_eq!(config.api.port, 8000);
        assert_eq!(config.threat_intel.cache_ttl_hours, 6);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: SbomguardConfig = toml::from_str("").unwrap();
        assert_eq!(config.db_path, PathBuf::from("db/sbomguard.sqlite"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = SbomguardConfig::load(Path::new("/nonexistent/sbomguard.toml")).unwrap();
        assert_eq!(config.api.host, "127.0.0.1");
    }
}
