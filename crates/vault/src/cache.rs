//! Bounded, expiring cache of reconstructed documents.

use docvault_core::DocumentId;
use docvault_core::config::CacheConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: usize,
}

struct Entry {
    payload: Arc<str>,
    /// None when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
    last_used: u64,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| deadline > now)
    }
}

struct Inner {
    entries: HashMap<DocumentId, Entry>,
    tick: u64,
    stats: CacheStats,
}

impl Inner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(id, _)| id.clone());
        if let Some(id) = oldest {
            self.entries.remove(&id);
            self.stats.evictions += 1;
        }
    }
}

/// Reconstructed payloads keyed by document id.
///
/// Entries expire after their TTL; when the cache is full the least recently
/// used entry is evicted. Stored documents never change, so entries need no
/// invalidation beyond expiry.
pub struct DocumentCache {
    inner: Mutex<Inner>,
    capacity: usize,
    ttl: Duration,
}

impl DocumentCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                tick: 0,
                stats: CacheStats::default(),
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Build the cache described by `config`, or None when it is disabled.
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(config.capacity, config.ttl()))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: &DocumentId) -> Option<Arc<str>> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let now = Instant::now();
        let tick = inner.next_tick();

        let expired = match inner.entries.get_mut(id) {
            Some(entry) if entry.is_live(now) => {
                entry.last_used = tick;
                let payload = entry.payload.clone();
                inner.stats.hits += 1;
                return Some(payload);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.remove(id);
            inner.stats.expirations += 1;
        }
        inner.stats.misses += 1;
        None
    }

    pub fn insert(&self, id: DocumentId, payload: Arc<str>) {
        self.insert_with_ttl(id, payload, self.ttl);
    }

    pub fn insert_with_ttl(&self, id: DocumentId, payload: Arc<str>, ttl: Duration) {
        let mut inner = self.lock();
        let tick = inner.next_tick();
        if !inner.entries.contains_key(&id) && inner.entries.len() >= self.capacity {
            inner.evict_lru();
        }
        inner.entries.insert(
            id,
            Entry {
                payload,
                expires_at: Instant::now().checked_add(ttl),
                last_used: tick,
            },
        );
    }

    pub fn remove(&self, id: &DocumentId) -> bool {
        self.lock().entries.remove(id).is_some()
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Drop every expired entry, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.lock();
        let now = Instant::now();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| entry.is_live(now));
        let purged = before - inner.entries.len();
        inner.stats.expirations += purged as u64;
        purged
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            ..inner.stats
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> DocumentId {
        DocumentId::parse(s).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_and_miss_are_counted() {
        let cache = DocumentCache::new(4, Duration::from_secs(60));
        assert!(cache.get(&id("a")).is_none());

        cache.insert(id("a"), Arc::from("payload"));
        assert_eq!(cache.get(&id("a")).as_deref(), Some("payload"));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = DocumentCache::new(4, Duration::from_secs(300));
        cache.insert(id("a"), Arc::from("x"));

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(cache.get(&id("a")).is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get(&id("a")).is_none());
        assert_eq!(cache.stats().expirations, 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_ttl_and_purge() {
        let cache = DocumentCache::new(4, Duration::from_secs(300));
        cache.insert_with_ttl(id("short"), Arc::from("s"), Duration::from_secs(1));
        cache.insert(id("long"), Arc::from("l"));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&id("long")).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cache_evicts_least_recently_used() {
        let cache = DocumentCache::new(2, Duration::from_secs(60));
        cache.insert(id("a"), Arc::from("a"));
        cache.insert(id("b"), Arc::from("b"));

        // Touch "a" so "b" becomes the eviction candidate.
        assert!(cache.get(&id("a")).is_some());
        cache.insert(id("c"), Arc::from("c"));

        assert!(cache.get(&id("b")).is_none());
        assert!(cache.get(&id("a")).is_some());
        assert!(cache.get(&id("c")).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_does_not_evict() {
        let cache = DocumentCache::new(1, Duration::from_secs(60));
        cache.insert(id("a"), Arc::from("1"));
        cache.insert(id("a"), Arc::from("2"));
        assert_eq!(cache.get(&id("a")).as_deref(), Some("2"));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_disabled_config_builds_nothing() {
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        assert!(DocumentCache::from_config(&config).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_ttl_never_expires() {
        let cache = DocumentCache::new(4, Duration::from_secs(u64::MAX));
        cache.insert(id("a"), Arc::from("kept"));
        assert_eq!(cache.get(&id("a")).as_deref(), Some("kept"));

        tokio::time::advance(Duration::from_secs(365 * 24 * 3600)).await;
        assert_eq!(cache.purge_expired(), 0);
        assert_eq!(cache.get(&id("a")).as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let cache = DocumentCache::new(4, Duration::from_secs(60));
        cache.insert(id("a"), Arc::from("a"));
        cache.insert(id("b"), Arc::from("b"));
        assert!(cache.remove(&id("a")));
        assert!(!cache.remove(&id("a")));
        cache.clear();
        assert!(cache.is_empty());
    }
}
