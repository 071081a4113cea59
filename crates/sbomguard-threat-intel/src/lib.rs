//! Threat intelligence enrichment for sbomguard.
//!
//! This crate provides:
//! - An async HTTP client for the CISA KEV catalog with a bounded timeout
//! - A local file cache with TTL-based refresh and fail-soft fallback
//! - Enrichment that annotates vulnerabilities with `threatintel` data
//!
//! The cache is an explicitly constructed object owned by the caller and
//! passed by reference; there is no process-wide mutable state.

pub mod cache;
pub mod client;
pub mod enrich;
pub mod error;
pub mod types;

// Re-export key types at crate root for convenience.
pub use cache::KevCache;
pub use client::KevClient;
pub use enrich::{annotate_vulnerabilities, annotation_for};
pub use error::ThreatIntelError;
pub use types::KevSnapshot;
