//! Content-addressed audio cache: a directory of blobs plus a JSON index,
//! bounded by entry count and age. Grounded in
//! `examples/original_source/ttskit/utils/audio_manager.py::AudioManager`,
//! re-expressed with the teacher's `Arc<RwLock<_>>` concurrency idiom
//! (`tts/cache.rs`) and `tokio::fs` for disk I/O instead of blocking I/O.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use crate::error::CacheError;

pub type Fingerprint = String;

/// `SHA256_hex(text || "_" || lang || "_" || engine_or_auto)`.
///
/// The Python original additionally folds in `voice`/`effects` (see
/// `_generate_cache_key`); spec §6 fixes the simpler three-field rule, which
/// is what's implemented here — see the Open Questions entry in DESIGN.md.
pub fn fingerprint(text: &str, lang: &str, engine: Option<&str>) -> Fingerprint {
    let engine_or_auto = engine.unwrap_or("auto");
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(b"_");
    hasher.update(lang.as_bytes());
    hasher.update(b"_");
    hasher.update(engine_or_auto.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub format: String,
    pub size: u64,
    pub created_at: i64,
    pub last_accessed_at: i64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub total_requests: u64,
    pub hit_rate: f64,
    pub file_count: usize,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    pub max_cache_size: usize,
    pub max_file_age_secs: u64,
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// A content-addressed store of synthesized audio blobs, bounded by
/// `max_cache_size` entries and `max_file_age` seconds.
pub struct AudioCache {
    cache_dir: PathBuf,
    max_cache_size: usize,
    max_file_age_secs: u64,
    index: RwLock<HashMap<Fingerprint, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AudioCache {
    pub async fn new(
        cache_dir: PathBuf,
        max_cache_size: usize,
        max_file_age_secs: u64,
    ) -> Result<Self, CacheError> {
        tokio::fs::create_dir_all(&cache_dir).await?;
        let index = load_index(&cache_dir).await;
        Ok(Self {
            cache_dir,
            max_cache_size,
            max_file_age_secs,
            index: RwLock::new(index),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    fn blob_path(&self, key: &str, format: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.{}", key, format))
    }

    /// An entry is valid iff its blob exists, its size matches the index
    /// record (a half-written blob from a crash won't), and its filesystem
    /// mtime is not older than `max_file_age_secs`. Ages off the blob's own
    /// mtime rather than `entry.created_at` so an externally rewritten blob
    /// resets its age, matching the original's `stat().st_mtime` check.
    async fn is_valid(&self, key: &str, entry: &CacheEntry) -> bool {
        let path = self.blob_path(key, &entry.format);
        let Ok(metadata) = tokio::fs::metadata(&path).await else {
            return false;
        };
        if metadata.len() != entry.size {
            return false;
        }
        let Ok(mtime) = metadata.modified() else {
            return false;
        };
        let age_secs = SystemTime::now()
            .duration_since(mtime)
            .unwrap_or_default()
            .as_secs();
        age_secs <= self.max_file_age_secs
    }

    /// Looks up by `(text, lang, engine)`, computing the fingerprint
    /// internally. Returns `None` on a miss, an invalid entry, or any I/O
    /// failure (cache errors degrade to a miss, never propagate).
    pub async fn get(&self, text: &str, lang: &str, engine: Option<&str>) -> Option<Vec<u8>> {
        let key = fingerprint(text, lang, engine);
        self.get_bytes(&key).await
    }

    /// Looks up directly by fingerprint, with a loose-blob fallback: if the
    /// index lacks the key but a plausible blob file exists on disk, treat
    /// it as present (supports caches written by an older index format).
    pub async fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        let entry = {
            let index = self.index.read().await;
            index.get(key).cloned()
        };

        let entry = match entry {
            Some(entry) if self.is_valid(key, &entry).await => Some(entry),
            Some(_) => {
                let mut index = self.index.write().await;
                index.remove(key);
                self.persist_index().await.ok();
                None
            }
            None => self.loose_blob_fallback(key).await,
        };

        let Some(entry) = entry else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let path = self.blob_path(key, &entry.format);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                self.touch(key, entry).await;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(bytes)
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "cache blob unreadable, treating as miss");
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn loose_blob_fallback(&self, key: &str) -> Option<CacheEntry> {
        for fmt in ["ogg", "mp3", "wav"] {
            let path = self.blob_path(key, fmt);
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                let now = now_secs();
                return Some(CacheEntry {
                    format: fmt.to_string(),
                    size: meta.len(),
                    created_at: now,
                    last_accessed_at: now,
                    metadata: HashMap::new(),
                });
            }
        }
        None
    }

    async fn touch(&self, key: &str, mut entry: CacheEntry) {
        entry.last_accessed_at = now_secs();
        let mut index = self.index.write().await;
        index.insert(key.to_string(), entry);
        drop(index);
        self.persist_index().await.ok();
    }

    /// Writes the blob, upserts the index, persists it, then runs eviction.
    pub async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        format: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), CacheError> {
        let path = self.blob_path(key, format);
        tokio::fs::write(&path, bytes).await?;

        let now = now_secs();
        {
            let mut index = self.index.write().await;
            index.insert(
                key.to_string(),
                CacheEntry {
                    format: format.to_string(),
                    size: bytes.len() as u64,
                    created_at: now,
                    last_accessed_at: now,
                    metadata,
                },
            );
        }
        self.persist_index().await?;
        self.evict().await;
        Ok(())
    }

    /// Removes entries with the smallest `last_accessed_at` until
    /// `count <= max_cache_size`.
    async fn evict(&self) {
        let mut index = self.index.write().await;
        if index.len() <= self.max_cache_size {
            return;
        }
        let mut entries: Vec<(String, i64, String)> = index
            .iter()
            .map(|(k, v)| (k.clone(), v.last_accessed_at, v.format.clone()))
            .collect();
        entries.sort_by_key(|(_, last_accessed, _)| *last_accessed);

        let excess = index.len() - self.max_cache_size;
        for (key, _, format) in entries.into_iter().take(excess) {
            index.remove(&key);
            let path = self.blob_path(&key, &format);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!(key, error = %e, "failed to remove evicted blob");
            }
        }
        drop(index);
        self.persist_index().await.ok();
    }

    pub async fn invalidate(&self, key: &str) -> bool {
        let entry = {
            let mut index = self.index.write().await;
            index.remove(key)
        };
        let Some(entry) = entry else {
            return false;
        };
        let path = self.blob_path(key, &entry.format);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(key, error = %e, "failed to remove invalidated blob");
        }
        self.persist_index().await.ok();
        true
    }

    pub async fn clear(&self) {
        let keys: Vec<(String, String)> = {
            let index = self.index.read().await;
            index
                .iter()
                .map(|(k, v)| (k.clone(), v.format.clone()))
                .collect()
        };
        for (key, format) in keys {
            let path = self.blob_path(&key, &format);
            tokio::fs::remove_file(&path).await.ok();
        }
        self.index.write().await.clear();
        self.persist_index().await.ok();
    }

    /// Removes blobs older than `max_age` (or the configured default) by
    /// filesystem mtime, and drops index entries whose blob is missing.
    pub async fn cleanup_old(&self, max_age: Option<u64>) {
        let max_age = max_age.unwrap_or(self.max_file_age_secs) as i64;
        let entries: Vec<(String, String)> = {
            let index = self.index.read().await;
            index
                .iter()
                .map(|(k, v)| (k.clone(), v.format.clone()))
                .collect()
        };
        let mut stale: Vec<(String, String)> = Vec::new();
        for (key, format) in entries {
            let path = self.blob_path(&key, &format);
            let is_stale = match tokio::fs::metadata(&path).await {
                Ok(metadata) => metadata
                    .modified()
                    .map(|mtime| {
                        SystemTime::now()
                            .duration_since(mtime)
                            .unwrap_or_default()
                            .as_secs() as i64
                            > max_age
                    })
                    .unwrap_or(true),
                Err(_) => true,
            };
            if is_stale {
                stale.push((key, format));
            }
        }
        let missing: Vec<String> = {
            let index = self.index.read().await;
            let mut missing = Vec::new();
            for (key, entry) in index.iter() {
                let path = self.blob_path(key, &entry.format);
                if tokio::fs::metadata(&path).await.is_err() {
                    missing.push(key.clone());
                }
            }
            missing
        };

        let mut index = self.index.write().await;
        for (key, format) in &stale {
            index.remove(key);
            let path = self.blob_path(key, format);
            tokio::fs::remove_file(&path).await.ok();
        }
        for key in missing {
            index.remove(&key);
        }
        drop(index);
        self.persist_index().await.ok();
    }

    /// Copies blobs into `dir` with human-readable names
    /// `<engine>_<lang>_<fingerprint>.<format>` derived from metadata.
    pub async fn export(&self, dir: &Path) -> Result<usize, CacheError> {
        tokio::fs::create_dir_all(dir).await?;
        let entries: Vec<(String, CacheEntry)> = {
            let index = self.index.read().await;
            index.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        let mut exported = 0;
        for (key, entry) in entries {
            let src = self.blob_path(&key, &entry.format);
            let engine = entry
                .metadata
                .get("engine")
                .map(String::as_str)
                .unwrap_or("unknown");
            let lang = entry
                .metadata
                .get("lang")
                .map(String::as_str)
                .unwrap_or("unknown");
            let dest = dir.join(format!("{}_{}_{}.{}", engine, lang, key, entry.format));
            if tokio::fs::copy(&src, &dest).await.is_ok() {
                exported += 1;
            }
        }
        Ok(exported)
    }

    pub async fn stats(&self) -> CacheStatsSnapshot {
        let index = self.index.read().await;
        let file_count = index.len();
        let total_size_bytes: u64 = index.values().map(|e| e.size).sum();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total_requests = hits + misses;
        CacheStatsSnapshot {
            hits,
            misses,
            total_requests,
            hit_rate: if total_requests > 0 {
                hits as f64 / total_requests as f64
            } else {
                0.0
            },
            file_count,
            total_size_bytes,
            total_size_mb: total_size_bytes as f64 / (1024.0 * 1024.0),
            max_cache_size: self.max_cache_size,
            max_file_age_secs: self.max_file_age_secs,
        }
    }

    async fn persist_index(&self) -> Result<(), CacheError> {
        let index = self.index.read().await;
        let json = serde_json::to_string_pretty(&*index)
            .map_err(|e| CacheError::MalformedIndex(e.to_string()))?;
        drop(index);
        let path = self.cache_dir.join("cache_index.json");
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

async fn load_index(cache_dir: &Path) -> HashMap<Fingerprint, CacheEntry> {
    let path = cache_dir.join("cache_index.json");
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!(error = %e, "malformed cache index, starting empty");
                HashMap::new()
            }
        },
        Err(_) => HashMap::new(),
    }
}

pub type SharedAudioCache = Arc<AudioCache>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn cache_with(max_size: usize) -> (AudioCache, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::new(dir.path().to_path_buf(), max_size, 3600)
            .await
            .unwrap();
        (cache, dir)
    }

    #[test]
    fn fingerprint_is_64_char_lowercase_hex() {
        let fp = fingerprint("hello", "en", None);
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn fingerprint_is_stable_across_calls() {
        assert_eq!(
            fingerprint("hello", "en", Some("gtts")),
            fingerprint("hello", "en", Some("gtts"))
        );
    }

    #[test]
    fn fingerprint_distinguishes_pinned_engine_from_auto() {
        assert_ne!(
            fingerprint("hello", "en", Some("auto")),
            fingerprint("hello", "en", None)
        );
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let (cache, _dir) = cache_with(10).await;
        let key = fingerprint("hi", "en", Some("gtts"));
        cache.put(&key, b"audio-bytes", "ogg", HashMap::new()).await.unwrap();
        let got = cache.get_bytes(&key).await;
        assert_eq!(got, Some(b"audio-bytes".to_vec()));
    }

    #[tokio::test]
    async fn miss_then_hit_counts() {
        let (cache, _dir) = cache_with(10).await;
        let key = fingerprint("hi", "en", Some("gtts"));
        assert!(cache.get_bytes(&key).await.is_none());
        cache.put(&key, b"x", "ogg", HashMap::new()).await.unwrap();
        assert!(cache.get_bytes(&key).await.is_some());
        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn eviction_keeps_count_at_max_and_drops_lru() {
        let (cache, _dir) = cache_with(2).await;
        let k1 = fingerprint("one", "en", None);
        let k2 = fingerprint("two", "en", None);
        let k3 = fingerprint("three", "en", None);

        cache.put(&k1, b"1", "ogg", HashMap::new()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        cache.put(&k2, b"2", "ogg", HashMap::new()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        cache.put(&k3, b"3", "ogg", HashMap::new()).await.unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.file_count, 2);
        assert!(cache.get_bytes(&k1).await.is_none());
        assert!(cache.get_bytes(&k2).await.is_some());
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let (cache, _dir) = cache_with(10).await;
        let key = fingerprint("hi", "en", None);
        cache.put(&key, b"x", "ogg", HashMap::new()).await.unwrap();
        cache.clear().await;
        cache.clear().await;
        assert_eq!(cache.stats().await.file_count, 0);
    }

    #[tokio::test]
    async fn invalidate_removes_entry_and_blob() {
        let (cache, _dir) = cache_with(10).await;
        let key = fingerprint("hi", "en", None);
        cache.put(&key, b"x", "ogg", HashMap::new()).await.unwrap();
        assert!(cache.invalidate(&key).await);
        assert!(!cache.invalidate(&key).await);
        assert!(cache.get_bytes(&key).await.is_none());
    }

    #[tokio::test]
    async fn index_round_trips_through_json() {
        let (cache, dir) = cache_with(10).await;
        let key = fingerprint("hi", "en", None);
        cache.put(&key, b"x", "ogg", HashMap::new()).await.unwrap();

        let reopened = AudioCache::new(dir.path().to_path_buf(), 10, 3600)
            .await
            .unwrap();
        assert_eq!(reopened.get_bytes(&key).await, Some(b"x".to_vec()));
    }
}
