//! In-memory response cache.
//!
//! Memoizes whole pipeline results per normalized query text. Entries expire
//! a fixed time after insertion; at capacity the least recently used entry is
//! evicted.

use crate::types::PipelineResult;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default capacity.
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Cache key for a query: blake3 hex of the lowercased, whitespace-collapsed text.
///
/// # Examples
///
/// ```
/// use inventory_nlq::cache::cache_key;
///
/// assert_eq!(cache_key("  Kaç   monitör VAR? "), cache_key("kaç monitör var?"));
/// ```
pub fn cache_key(query: &str) -> String {
    let normalized = query
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    blake3::hash(normalized.as_bytes()).to_hex().to_string()
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Live entries (expired entries not yet purged included)
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub total_requests: u64,
    /// Hit percentage, rounded to two decimals
    pub hit_rate: f64,
    pub ttl_seconds: u64,
}

#[derive(Debug)]
struct CacheEntry {
    query: String,
    result: PipelineResult,
    inserted_at: Instant,
}

#[derive(Debug)]
struct CacheState {
    /// Recency order: least recently used first
    entries: LruCache<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Thread-safe TTL + LRU response cache.
///
/// The lock is never held across an `.await`.
#[derive(Debug)]
pub struct ResponseCache {
    state: Mutex<CacheState>,
    ttl: Duration,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_MAX_SIZE)
    }
}

impl ResponseCache {
    /// Create new cache.
    ///
    /// # Arguments
    ///
    /// * `ttl` - Entry lifetime measured from insertion
    /// * `max_size` - Capacity (at least 1)
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        let capacity = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.duration_since(entry.inserted_at) > self.ttl
    }

    /// Look up a cached result.
    ///
    /// Purges every expired entry first. Counts a hit or a miss; a hit
    /// makes the entry the most recently used.
    pub fn get(&self, query: &str) -> Option<PipelineResult> {
        let key = cache_key(query);
        let now = Instant::now();
        let mut state = self.lock();

        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(key, _)| key.clone())
            .collect();
        for stale in &expired {
            state.entries.pop(stale);
        }
        if !expired.is_empty() {
            debug!(purged = expired.len(), "Purged expired cache entries");
        }

        let result = state.entries.get(&key).map(|entry| entry.result.clone());
        match result {
            Some(result) => {
                state.hits += 1;
                Some(result)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Store a result.
    ///
    /// Replacing an existing key never evicts; inserting a new key at
    /// capacity evicts the least recently used entry.
    pub fn set(&self, query: &str, result: PipelineResult) {
        let key = cache_key(query);
        let entry = CacheEntry {
            query: query.to_string(),
            result,
            inserted_at: Instant::now(),
        };

        let mut state = self.lock();
        if let Some((evicted, _)) = state.entries.push(key.clone(), entry) {
            if evicted != key {
                debug!("Evicted least recently used cache entry");
            }
        }
    }

    /// Remove entries whose query contains `pattern` (case-insensitive).
    ///
    /// # Returns
    ///
    /// Number of entries removed
    pub fn invalidate(&self, pattern: &str) -> usize {
        let pattern = pattern.to_lowercase();
        let mut state = self.lock();
        let matching: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.query.to_lowercase().contains(&pattern))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &matching {
            state.entries.pop(key);
        }
        matching.len()
    }

    /// Drop all entries and reset hit/miss counters.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.hits = 0;
        state.misses = 0;
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Check if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        let total = state.hits + state.misses;
        let hit_rate = if total > 0 {
            (state.hits as f64 / total as f64 * 10_000.0).round() / 100.0
        } else {
            0.0
        };

        CacheStats {
            size: state.entries.len(),
            max_size: state.entries.cap().get(),
            hits: state.hits,
            misses: state.misses,
            total_requests: total,
            hit_rate,
            ttl_seconds: self.ttl.as_secs(),
        }
    }
}
