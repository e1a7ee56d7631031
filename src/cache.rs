//! Local cache for fetch results, keyed by a hash of the effective query.
//!
//! Entries are plain JSON records on disk, addressed by a SHA-256 of the
//! composite key (logical query + limit + sort). The limit and sort take
//! part in the key because the fetcher over-fetches depending on sort
//! delegability, so two fetches over the same raw query are not
//! substitutable. Expired entries are treated as misses, not purged.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

const CACHE_VERSION: u32 = 1;

/// Entries older than this are treated as absent.
pub const CACHE_TTL_HOURS: i64 = 24;

/// On-disk entry format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Schema version for forward compatibility
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    pub key: String,
    pub value: serde_json::Value,
}

impl CacheEntry {
    pub fn new(key: String, value: serde_json::Value) -> Self {
        Self {
            version: CACHE_VERSION,
            timestamp: Utc::now(),
            key,
            value,
        }
    }

    pub fn is_expired(&self, ttl_hours: i64) -> bool {
        let age = Utc::now().signed_duration_since(self.timestamp);
        age.num_hours() >= ttl_hours || age.num_seconds() < 0
    }
}

/// Composite cache key for one fetch: logical query, result budget, sort.
pub fn cache_key(plan_key: &str, limit: usize, sort: &str) -> String {
    let composite = format!("{}|limit={}|sort={}", plan_key, limit, sort);
    let digest = Sha256::digest(composite.as_bytes());
    hex::encode(digest)
}

fn entry_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("query-{}.json", key))
}

/// Read a cached value. Absent, expired, unreadable, or version-mismatched
/// entries all read as `None`; this never fails.
pub fn read(dir: &Path, key: &str) -> Option<serde_json::Value> {
    let path = entry_path(dir, key);
    match read_entry(&path) {
        Ok(Some(entry)) => {
            if entry.is_expired(CACHE_TTL_HOURS) {
                tracing::debug!("Cache entry expired for key {}", key);
                return None;
            }
            Some(entry.value)
        }
        Ok(None) => None,
        Err(e) => {
            tracing::debug!("Failed to read cache entry {}: {}", path.display(), e);
            None
        }
    }
}

fn read_entry(path: &Path) -> Result<Option<CacheEntry>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cache from {}", path.display()))?;

    let entry: CacheEntry = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse cache from {}", path.display()))?;

    if entry.version != CACHE_VERSION {
        tracing::warn!(
            "Cache version mismatch (expected {}, got {}), ignoring cache",
            CACHE_VERSION,
            entry.version
        );
        return Ok(None);
    }

    Ok(Some(entry))
}

/// Write a cache entry. The value lands in a uniquely-named temp file first
/// and is promoted with an atomic rename, so a concurrent reader sees either
/// the old entry or the new one, never a partial write.
pub fn write(dir: &Path, key: &str, value: serde_json::Value) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create cache dir {}", dir.display()))?;

    let entry = CacheEntry::new(key.to_string(), value);
    let content = serde_json::to_string(&entry).context("Failed to serialize cache entry")?;

    let final_path = entry_path(dir, key);
    let tmp_path = dir.join(format!(".tmp-{}-{}", key, uuid::Uuid::new_v4()));

    std::fs::write(&tmp_path, content)
        .with_context(|| format!("Failed to write cache to {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, &final_path).with_context(|| {
        format!(
            "Failed to promote cache entry {} -> {}",
            tmp_path.display(),
            final_path.display()
        )
    })?;

    Ok(())
}
