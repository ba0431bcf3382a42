//! Response Cache.
//!
//! Content-addressed store of prior results with a fixed TTL and bounded
//! occupancy. The orchestrator talks to the [`ResultCache`] trait so tests
//! and embedders can inject their own store.

mod key;

pub use key::cache_key;

use crate::config::CacheConfig;
use crate::types::AnalysisResult;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Concurrency-safe result store.
pub trait ResultCache: Send + Sync + 'static {
    /// Fetch a live entry. Expired entries are misses.
    fn get(&self, key: &str) -> Option<AnalysisResult>;

    fn put(&self, key: String, value: AnalysisResult);

    /// Drop every expired entry, returning how many were removed.
    fn purge_expired(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct CacheEntry {
    value: AnalysisResult,
    created_at: Instant,
    /// Distinguishes re-insertions of the same key in `order`.
    generation: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    /// Insertion order, oldest first. May hold stale (key, generation) pairs
    /// for keys that were overwritten or removed; those are skipped on eviction.
    order: VecDeque<(String, u64)>,
    next_generation: u64,
}

impl Inner {
    fn remove_oldest(&mut self) {
        while let Some((key, generation)) = self.order.pop_front() {
            let live = self
                .entries
                .get(&key)
                .is_some_and(|e| e.generation == generation);
            if live {
                self.entries.remove(&key);
                return;
            }
        }
    }

    fn compact_order(&mut self) {
        let entries = &self.entries;
        self.order
            .retain(|(k, g)| entries.get(k).is_some_and(|e| e.generation == *g));
    }
}

/// In-memory TTL cache with oldest-first eviction.
#[derive(Debug)]
pub struct MemoryCache {
    inner: Mutex<Inner>,
    ttl: Duration,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.max_entries)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the map half-updated
        // in a way that matters for a cache; keep serving.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ResultCache for MemoryCache {
    fn get(&self, key: &str) -> Option<AnalysisResult> {
        let mut inner = self.lock();
        let expired = match inner.entries.get(key) {
            Some(entry) if entry.created_at.elapsed() < self.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.entries.remove(key);
            tracing::trace!(key = %key, "Evicted expired cache entry");
        }
        None
    }

    fn put(&self, key: String, value: AnalysisResult) {
        let mut inner = self.lock();
        let generation = inner.next_generation;
        inner.next_generation += 1;

        inner.entries.insert(
            key.clone(),
            CacheEntry {
                value,
                created_at: Instant::now(),
                generation,
            },
        );
        inner.order.push_back((key, generation));

        while inner.entries.len() > self.max_entries {
            inner.remove_oldest();
        }
        if inner.order.len() > self.max_entries * 2 {
            inner.compact_order();
        }
    }

    fn purge_expired(&self) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        let ttl = self.ttl;
        inner.entries.retain(|_, e| e.created_at.elapsed() < ttl);
        inner.compact_order();
        before - inner.entries.len()
    }

    fn len(&self) -> usize {
        self.lock().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Severity, Usage};
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn result(explanation: &str) -> AnalysisResult {
        AnalysisResult {
            explanation: explanation.to_string(),
            solution: "Check the value before calling it.".to_string(),
            code_example: None,
            category: "javascript".to_string(),
            tags: BTreeSet::new(),
            confidence: 0.9,
            severity: Severity::Medium,
            provider: "google".to_string(),
            model: "gemini-1.5-flash".to_string(),
            usage: Usage::default(),
            latency_ms: 12,
            produced_at: Utc::now(),
            degraded: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl() {
        let cache = MemoryCache::new(Duration::from_secs(60), 10);
        cache.put("k".to_string(), result("a"));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get("k").unwrap().explanation, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_miss_and_evicted() {
        let cache = MemoryCache::new(Duration::from_secs(60), 10);
        cache.put("k".to_string(), result("a"));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(cache.get("k").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn test_oldest_evicted_when_full() {
        let cache = MemoryCache::new(Duration::from_secs(60), 2);
        cache.put("a".to_string(), result("a"));
        cache.put("b".to_string(), result("b"));
        cache.put("c".to_string(), result("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[tokio::test]
    async fn test_overwrite_refreshes_insertion_order() {
        let cache = MemoryCache::new(Duration::from_secs(60), 2);
        cache.put("a".to_string(), result("a1"));
        cache.put("b".to_string(), result("b"));
        cache.put("a".to_string(), result("a2"));
        cache.put("c".to_string(), result("c"));

        // "b" is now the oldest live insertion
        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a").unwrap().explanation, "a2");
        assert!(cache.get("c").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = MemoryCache::new(Duration::from_secs(10), 10);
        cache.put("old".to_string(), result("old"));
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.put("new".to_string(), result("new"));
        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("new").is_some());
    }

    #[tokio::test]
    async fn test_concurrent_puts_respect_bound() {
        let cache = std::sync::Arc::new(MemoryCache::new(Duration::from_secs(60), 16));
        let mut handles = Vec::new();
        for t in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    cache.put(format!("{}-{}", t, i), result("x"));
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(cache.len(), 16);
    }
}
