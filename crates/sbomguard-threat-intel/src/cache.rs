//! Local file cache for the downloaded KEV snapshot.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, ThreatIntelError};
use crate::types::KevSnapshot;

/// File name of the snapshot inside the cache directory.
const SNAPSHOT_FILENAME: &str = "cisa_kev.json";

/// Manages the on-disk KEV snapshot.
#[derive(Debug, Clone)]
pub struct KevCache {
    cache_dir: PathBuf,
}

impl KevCache {
    /// Create a cache rooted at the given directory.
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Path of the snapshot file.
    pub fn snapshot_path(&self) -> PathBuf {
        self.cache_dir.join(SNAPSHOT_FILENAME)
    }

    /// Ensure the cache directory exists.
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.cache_dir).map_err(|e| {
            ThreatIntelError::CacheError(format!(
                "failed to create cache dir {}: {e}",
                self.cache_dir.display()
            ))
        })
    }

    /// Read the cached snapshot, if one exists.
    ///
    /// A corrupt snapshot file is logged and treated as absent, never an
    /// error: the feed will simply be refetched.
    pub fn read(&self) -> Option<KevSnapshot> {
        let path = self.snapshot_path();
        if !path.exists() {
            return None;
        }
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %path.display(), "failed to read KEV cache: {e}");
                return None;
            }
        };
        match serde_json::from_str::<KevSnapshot>(&data) {
            Ok(snapshot) => {
                debug!(count = snapshot.cves.len(), "loaded cached KEV snapshot");
                Some(snapshot)
            }
            Err(e) => {
                warn!(path = %path.display(), "corrupt KEV cache, ignoring: {e}");
                None
            }
        }
    }

    /// Write a snapshot to the cache.
    pub fn write(&self, snapshot: &KevSnapshot) -> Result<()> {
        self.ensure_dir()?;
        let data = serde_json::to_string(snapshot)?;
        std::fs::write(self.snapshot_path(), data)?;
        debug!(count = snapshot.cves.len(), "cached KEV snapshot");
        Ok(())
    }

    /// Whether a snapshot file is present at all.
    pub fn is_populated(&self) -> bool {
        self.snapshot_path().exists()
    }

    /// Remove the cached snapshot.
    pub fn clear(&self) -> Result<()> {
        let path = self.snapshot_path();
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}

impl KevCache {
    /// Convenience constructor matching the layout under a config's cache
    /// directory.
    pub fn under(cache_dir: &Path) -> Self {
        Self::new(cache_dir.join("threat-intel"))
    }
}
