//! In-process cache backend: a size-bounded, TTL-expiring map.
//!
//! Shaped after teacher's `Fetcher::robots_cache`/`rate_limiter`
//! (`Arc<RwLock<HashMap<_, _>>>`, scoped read/write blocks).

use super::{FeedCache, DEFAULT_CAPACITY, DEFAULT_TTL};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
    last_used: Instant,
}

pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
    capacity: usize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_TTL, DEFAULT_CAPACITY)
    }

    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            capacity,
        }
    }

    /// Evicts the least-recently-used entry. Called with the write lock held.
    fn evict_lru(entries: &mut HashMap<String, Entry>) {
        if let Some(key) = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone())
        {
            entries.remove(&key);
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedCache for MemoryCache {
    async fn get(&self, url: &str) -> Option<Vec<u8>> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(url) {
                if entry.expires_at > Instant::now() {
                    // Fall through to take the write lock for LRU bookkeeping.
                } else {
                    debug!(url, "feed cache entry expired");
                    return None;
                }
            } else {
                return None;
            }
        }

        let mut entries = self.entries.write().await;
        match entries.get_mut(url) {
            Some(entry) if entry.expires_at > Instant::now() => {
                entry.last_used = Instant::now();
                debug!(url, "feed cache hit");
                Some(entry.value.clone())
            }
            _ => None,
        }
    }

    async fn set(&self, url: &str, value: Vec<u8>) {
        let mut entries = self.entries.write().await;
        if entries.len() >= self.capacity && !entries.contains_key(url) {
            Self::evict_lru(&mut entries);
        }
        let now = Instant::now();
        entries.insert(
            url.to_string(),
            Entry {
                value,
                expires_at: now + self.ttl,
                last_used: now,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_on_empty_cache() {
        let cache = MemoryCache::new();
        assert!(cache.get("https://example.com/feed").await.is_none());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = MemoryCache::new();
        cache.set("https://example.com/feed", b"snapshot".to_vec()).await;
        assert_eq!(cache.get("https://example.com/feed").await, Some(b"snapshot".to_vec()));
    }

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let cache = MemoryCache::with_limits(Duration::from_millis(10), DEFAULT_CAPACITY);
        cache.set("https://example.com/feed", b"snapshot".to_vec()).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get("https://example.com/feed").await.is_none());
    }

    #[tokio::test]
    async fn capacity_overflow_evicts_least_recently_used() {
        let cache = MemoryCache::with_limits(DEFAULT_TTL, 2);
        cache.set("a", b"1".to_vec()).await;
        cache.set("b", b"2".to_vec()).await;
        // touch `a` so `b` becomes the LRU entry
        cache.get("a").await;
        cache.set("c", b"3".to_vec()).await;

        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_none());
        assert!(cache.get("c").await.is_some());
    }
}
