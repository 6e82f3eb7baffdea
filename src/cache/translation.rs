use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Configuration for the translation cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries before LRU eviction
    pub max_size: usize,
    /// Entries older than this are treated as misses
    pub ttl: Duration,
    /// Language hints folded into every fingerprint
    pub source_language: String,
    pub target_language: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            ttl: Duration::from_secs(86400),
            source_language: "auto".to_string(),
            target_language: "auto".to_string(),
        }
    }
}

/// Snapshot served by the status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    /// Percentage of lookups that hit, 0.0 when nothing was looked up yet
    pub hit_rate: f64,
}

struct CacheEntry<T> {
    payload: T,
    stored_at: Instant,
    /// Position in the recency index
    tick: u64,
}

struct CacheInner<T> {
    entries: HashMap<String, CacheEntry<T>>,
    /// tick → key, oldest access first
    recency: BTreeMap<u64, String>,
    next_tick: u64,
    hits: u64,
    misses: u64,
}

impl<T> CacheInner<T> {
    fn bump(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<T>> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.tick);
        Some(entry)
    }
}

/// Process-wide LRU memo of translations with TTL expiry.
///
/// Keys are fingerprints of the utterance text plus the deployment's
/// language hints. Hit/miss counters only reset through [`clear`].
///
/// [`clear`]: TranslationCache::clear
pub struct TranslationCache<T> {
    config: CacheConfig,
    inner: Mutex<CacheInner<T>>,
}

impl<T: Clone> TranslationCache<T> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                next_tick: 0,
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Look up a translation, promoting it to most recently used
    pub fn get(&self, text: &str) -> Option<T> {
        let key = self.key_for(text);
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let expired = match inner.entries.get(&key) {
            None => {
                inner.misses += 1;
                return None;
            }
            Some(entry) => now.duration_since(entry.stored_at) > self.config.ttl,
        };

        if expired {
            inner.remove(&key);
            inner.misses += 1;
            debug!("Translation cache entry expired");
            return None;
        }

        let tick = inner.bump();
        let entry = inner.entries.get_mut(&key)?;
        let old_tick = std::mem::replace(&mut entry.tick, tick);
        let payload = entry.payload.clone();
        inner.recency.remove(&old_tick);
        inner.recency.insert(tick, key);
        inner.hits += 1;

        Some(payload)
    }

    /// Store a translation, evicting the least recently used entry when full
    pub fn put(&self, text: &str, payload: T) {
        if self.config.max_size == 0 {
            return;
        }

        let key = self.key_for(text);
        let mut inner = self.inner.lock();

        if inner.remove(&key).is_none() && inner.entries.len() >= self.config.max_size {
            if let Some((_, oldest)) = inner.recency.pop_first() {
                inner.entries.remove(&oldest);
                debug!("Evicted least recently used translation");
            }
        }

        let tick = inner.bump();
        inner.recency.insert(tick, key.clone());
        inner.entries.insert(
            key,
            CacheEntry {
                payload,
                stored_at: Instant::now(),
                tick,
            },
        );
    }

    /// Drop all entries and reset the hit/miss counters
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.recency.clear();
        inner.hits = 0;
        inner.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let total = inner.hits + inner.misses;
        let hit_rate = if total > 0 {
            inner.hits as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        CacheStats {
            size: inner.entries.len(),
            max_size: self.config.max_size,
            hits: inner.hits,
            misses: inner.misses,
            hit_rate,
        }
    }

    fn key_for(&self, text: &str) -> String {
        fingerprint(
            text,
            &self.config.source_language,
            &self.config.target_language,
        )
    }
}

/// SHA-256 over the trimmed text and both language hints, hex encoded
pub fn fingerprint(text: &str, source_language: &str, target_language: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.trim().as_bytes());
    hasher.update(b"|");
    hasher.update(source_language.as_bytes());
    hasher.update(b"|");
    hasher.update(target_language.as_bytes());
    hex::encode(hasher.finalize())
}
