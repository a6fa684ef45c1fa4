//! Crawl state persisted next to the raw payloads so an interrupted fetch can
//! pick up where it stopped and a finished one is not repeated.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::storage;

/// File name of the manifest inside the download directory.
pub const MANIFEST_FILE: &str = ".wtdl-fetch.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchManifest {
    /// Base URL the crawl was started with.
    pub base_url: String,
    /// Highest id attempted (0 = none yet). Ids `1..=last_attempted` have all been tried.
    pub last_attempted: u64,
    /// Highest id that returned a payload.
    #[serde(default)]
    pub last_fetched: Option<u64>,
    /// Number of payload files written across all runs.
    #[serde(default)]
    pub fetched: u64,
    /// True once the end of the id space was detected.
    #[serde(default)]
    pub complete: bool,
    /// Unix seconds of the last save.
    #[serde(default)]
    pub updated_at: u64,
}

impl FetchManifest {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            last_attempted: 0,
            last_fetched: None,
            fetched: 0,
            complete: false,
            updated_at: 0,
        }
    }

    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    /// First id the next attempt should use.
    pub fn next_id(&self) -> u64 {
        self.last_attempted + 1
    }

    /// Record that `id` was attempted and whether it produced a payload.
    pub fn record_attempt(&mut self, id: u64, fetched: bool) {
        self.last_attempted = self.last_attempted.max(id);
        if fetched {
            self.fetched += 1;
            self.last_fetched = Some(self.last_fetched.map_or(id, |prev| prev.max(id)));
        }
    }

    /// Load the manifest from `dir`. Missing file → `None`.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = Self::path_in(dir);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("read manifest: {}", path.display())),
        };
        let manifest: FetchManifest = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse manifest: {}", path.display()))?;
        Ok(Some(manifest))
    }

    /// Save to `dir` (atomically), stamping `updated_at`.
    pub fn save(&mut self, dir: &Path) -> Result<()> {
        self.updated_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let path = Self::path_in(dir);
        let json = serde_json::to_vec_pretty(self).context("serialize manifest")?;
        storage::write_atomic(&path, &json)
            .with_context(|| format!("write manifest: {}", path.display()))?;
        Ok(())
    }
}
