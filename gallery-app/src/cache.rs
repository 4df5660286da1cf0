use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use gallery_core::GalleryItem;
use serde::{Deserialize, Serialize};

/// Bumping the version segment invalidates every cache written by an
/// older record format.
const CACHE_FILE: &str = "index-cache.v2.json";
const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_MAX_ITEMS: usize = 5_000;

#[derive(Debug, Deserialize, Serialize)]
struct CacheRecord {
    stored_at: u64,
    items: Vec<GalleryItem>,
}

/// Persistent copy of the last fully synced item index. `read` treats a
/// missing, malformed, or expired record as absent; `write` is best
/// effort and callers must not rely on it succeeding.
#[derive(Debug, Clone)]
pub struct IndexCache {
    path: PathBuf,
    ttl: Duration,
    max_items: usize,
}

impl IndexCache {
    pub fn at_dir(dir: PathBuf) -> Self {
        Self {
            path: dir.join(CACHE_FILE),
            ttl: DEFAULT_TTL,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }

    pub fn with_limits(mut self, ttl: Duration, max_items: usize) -> Self {
        self.ttl = ttl;
        self.max_items = max_items;
        self
    }

    pub fn read(&self) -> Option<Vec<GalleryItem>> {
        self.read_at(epoch_ms())
    }

    fn read_at(&self, now_ms: u64) -> Option<Vec<GalleryItem>> {
        let raw = fs::read(&self.path).ok()?;
        let record: CacheRecord = serde_json::from_slice(&raw).ok()?;
        let age = now_ms.saturating_sub(record.stored_at);
        if age > self.ttl.as_millis().min(u128::from(u64::MAX)) as u64 {
            return None;
        }
        Some(record.items)
    }

    /// Overwrites the full record, or skips silently: sets above the
    /// item ceiling are not persisted, and storage failures degrade to
    /// running without a cache.
    pub fn write(&self, items: &[GalleryItem]) {
        if items.len() > self.max_items {
            return;
        }
        let record = CacheRecord {
            stored_at: epoch_ms(),
            items: items.to_vec(),
        };
        let Ok(raw) = serde_json::to_vec(&record) else {
            return;
        };
        let _ = self.write_atomic(&raw);
    }

    // Readers only ever see the previous record or the new one, never a
    // torn write.
    fn write_atomic(&self, raw: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let partial = self.path.with_extension("json.partial");
        fs::write(&partial, raw)?;
        fs::rename(partial, &self.path)
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().min(u128::from(u64::MAX)) as u64)
        .unwrap_or(0)
}
