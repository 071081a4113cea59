//! Async KEV feed client with TTL refresh and fail-soft fallback.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use sbomguard_core::config::FeedConfig;

use crate::cache::KevCache;
use crate::error::Result;
use crate::types::{KevFeed, KevSnapshot};

/// Client for the known-exploited-vulnerabilities feed.
///
/// Owned by the caller and passed by reference into enrichment; holds the
/// in-memory snapshot, the on-disk cache, and the HTTP client. Fetching
/// fails soft: correlation always gets a snapshot, possibly empty.
#[derive(Debug)]
pub struct KevClient {
    config: FeedConfig,
    cache: KevCache,
    http: reqwest::Client,
    snapshot: Option<KevSnapshot>,
}

impl KevClient {
    /// Build a client. The HTTP timeout comes from the feed config.
    pub fn new(config: FeedConfig, cache: KevCache) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()?;
        Ok(Self {
            config,
            cache,
            http,
            snapshot: None,
        })
    }

    /// Return a usable snapshot, refreshing when the current one expired.
    ///
    /// Never fails: on fetch error the last-known snapshot is returned, or
    /// an empty one with a short back-off expiry so the next run retries
    /// soon.
    pub async fn snapshot(&mut self) -> KevSnapshot {
        let now = Utc::now();

        if let Some(snapshot) = &self.snapshot {
            if snapshot.is_fresh(now) {
                return snapshot.clone();
            }
        }

        if let Some(snapshot) = self.cache.read() {
            if snapshot.is_fresh(now) {
                debug!(count = snapshot.cves.len(), "using cached KEV snapshot");
                self.snapshot = Some(snapshot.clone());
                return snapshot;
            }
        }

        match self.fetch().await {
            Ok(snapshot) => {
                info!(count = snapshot.cves.len(), "refreshed KEV feed");
                self.persist(&snapshot);
                self.snapshot = Some(snapshot.clone());
                snapshot
            }
            Err(e) => {
                warn!("failed to refresh KEV feed, failing soft: {e}");
                let fallback = self
                    .snapshot
                    .clone()
                    .or_else(|| self.cache.read())
                    .unwrap_or_else(|| {
                        KevSnapshot::empty(
                            now + chrono::Duration::minutes(
                                self.config.failure_backoff_minutes as i64,
                            ),
                        )
                    });
                self.persist(&fallback);
                self.snapshot = Some(fallback.clone());
                fallback
            }
        }
    }

    async fn fetch(&self) -> Result<KevSnapshot> {
        let response = self
            .http
            .get(&self.config.kev_url)
            .send()
            .await?
            .error_for_status()?;
        let feed: KevFeed = response.json().await?;
        let expires_at = Utc::now() + chrono::Duration::hours(self.config.cache_ttl_hours as i64);
        Ok(KevSnapshot::from_feed(&feed, expires_at))
    }

    /// Best-effort cache write; a failed write only loses the warm start.
    fn persist(&self, snapshot: &KevSnapshot) {
        if let Err(e) = self.cache.write(snapshot) {
            debug!("unable to persist KEV snapshot: {e}");
        }
    }
}
