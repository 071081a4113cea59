//! Scan orchestration for sbomguard.
//!
//! This crate wires the pure correlation core to the outside world:
//! - Trivy invocation and vulnerability indexing
//! - Context profile generation from project manifests
//! - SQLite persistence of scans, components, vulnerabilities, and threats
//! - JSON and HTML report writers
//! - The scan pipeline tying it all together

pub mod context_gen;
pub mod pipeline;
pub mod report;
pub mod storage;
pub mod trivy;

pub use pipeline::{ScanOutcome, ScanPipeline};
pub use storage::ThreatStore;
pub use trivy::{TrivyError, TrivyScanner};
