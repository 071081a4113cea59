//! Core correlation and scoring engine for sbomguard.
//!
//! This crate provides:
//! - The shared data model (components, service context, threat records)
//! - A rule catalog loaded from a directory of JSON rule files
//! - A pure, total condition evaluator over loosely-typed scan data
//! - The correlation engine that turns rule matches into threat hypotheses
//! - The weighted-sum risk scorer and the final threat assembler
//!
//! Everything here is synchronous and free of shared mutable state: once a
//! catalog is loaded it can be shared across concurrent evaluations without
//! locking.

pub mod assemble;
pub mod config;
pub mod context;
pub mod engine;
pub mod model;
pub mod rules;
pub mod sbom;
pub mod scoring;

// Re-export key types at crate root for convenience.
pub use config::SbomguardConfig;
pub use engine::CorrelationEngine;
pub use model::{
    Component, IntelAnnotation, RuleSeverity, ScoredThreat, ServiceContext, ThreatHypothesis,
};
pub use rules::Rule;
