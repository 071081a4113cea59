//! Feed wire formats and the cached snapshot type.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The CISA KEV catalog fields we consume.
#[derive(Debug, Deserialize)]
pub struct KevFeed {
    #[serde(default)]
    pub vulnerabilities: Vec<KevEntry>,
}

#[derive(Debug, Deserialize)]
pub struct KevEntry {
    /// The feed has used both `cveID` and `cveId` over time.
    #[serde(default, rename = "cveID", alias = "cveId")]
    pub cve_id: Option<String>,
}

/// A point-in-time view of the KEV catalog with an expiry.
///
/// Snapshots serialize to the on-disk cache format; CVE ids are stored
/// uppercased and sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KevSnapshot {
    pub cves: BTreeSet<String>,
    pub expires_at: DateTime<Utc>,
}

impl KevSnapshot {
    /// Build a snapshot from fetched feed entries.
    pub fn from_feed(feed: &KevFeed, expires_at: DateTime<Utc>) -> Self {
        let cves = feed
            .vulnerabilities
            .iter()
            .filter_map(|entry| entry.cve_id.as_deref())
            .filter(|id| !id.is_empty())
            .map(str::to_uppercase)
            .collect();
        Self { cves, expires_at }
    }

    /// An empty snapshot, used as the fail-soft fallback.
    pub fn empty(expires_at: DateTime<Utc>) -> Self {
        Self {
            cves: BTreeSet::new(),
            expires_at,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, cve: &str) -> bool {
        self.cves.contains(&cve.to_uppercase())
    }
}
