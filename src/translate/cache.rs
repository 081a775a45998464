//! In-memory LRU result cache.
//! Key: blake3 fingerprint of (src_lang, tgt_lang, text).
//! One mutex guards both the map and the recency order, so an entry can
//! never exist in one and not the other.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;

/// Deterministic request fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Each field is length-prefixed so no two distinct triples hash the
    /// same input bytes.
    pub fn fingerprint(src_lang: &str, tgt_lang: &str, text: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in [src_lang, tgt_lang, text] {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        CacheKey(*hasher.finalize().as_bytes())
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in &self.0[..8] {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub capacity: usize,
}

pub struct ResultCache {
    inner: Mutex<LruCache<CacheKey, String>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    /// A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a translation and mark it most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        let found = self.inner.lock().get(key).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Look up without promoting or touching the counters.
    pub fn peek(&self, key: &CacheKey) -> Option<String> {
        self.inner.lock().peek(key).cloned()
    }

    /// Insert or overwrite. At capacity, the least recently used entry is
    /// evicted before a new key goes in.
    pub fn put(&self, key: CacheKey, translated_text: String) {
        let evicted = self.inner.lock().push(key, translated_text);
        if let Some((old_key, _)) = evicted {
            if old_key != key {
                tracing::trace!(key = %old_key, "cache_evicted");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        let (entries, capacity) = {
            let cache = self.inner.lock();
            (cache.len(), cache.cap().get())
        };
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
            capacity,
        }
    }
}
