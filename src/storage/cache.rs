//! Request/response cache
//!
//! Deduplicates identical requests inside a short TTL. Eviction is by
//! insertion order: a hit does not move an entry, so the oldest write is
//! always the next one out.

use crate::core::types::Surface;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::fmt::Write;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub identity: String,
    pub surface: Surface,
    pub content_hash: String,
}

impl CacheKey {
    pub fn derive(identity: &str, surface: Surface, text: &str, context: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalize(text).as_bytes());
        hasher.update([0x1f]);
        hasher.update(normalize(context).as_bytes());
        let digest = hasher.finalize();

        let mut content_hash = String::with_capacity(32);
        for byte in &digest[..16] {
            let _ = write!(content_hash, "{:02x}", byte);
        }

        Self {
            identity: identity.to_string(),
            surface,
            content_hash,
        }
    }
}

/// Lowercase and collapse whitespace so trivially different spellings share a key
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug)]
struct CacheEntry {
    value: String,
    created_at: Instant,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<CacheKey, CacheEntry>,
    order: VecDeque<CacheKey>,
}

pub struct ResponseCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
    capacity: usize,
}

impl ResponseCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            ttl,
            capacity,
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        self.get_at(key, Instant::now()).await
    }

    /// Stale entries read as absent but stay until evicted or cleared
    pub async fn get_at(&self, key: &CacheKey, now: Instant) -> Option<String> {
        let inner = self.inner.lock().await;
        inner
            .entries
            .get(key)
            .filter(|entry| now.saturating_duration_since(entry.created_at) < self.ttl)
            .map(|entry| entry.value.clone())
    }

    pub async fn put(&self, key: CacheKey, value: String) {
        self.put_at(key, value, Instant::now()).await
    }

    pub async fn put_at(&self, key: CacheKey, value: String, now: Instant) {
        if self.capacity == 0 {
            return;
        }

        let mut inner = self.inner.lock().await;
        let entry = CacheEntry {
            value,
            created_at: now,
        };

        // Rewriting a key keeps its original queue position
        if let Some(existing) = inner.entries.get_mut(&key) {
            *existing = entry;
            return;
        }

        while inner.entries.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                    tracing::debug!("[ResponseCache] Evicted oldest entry");
                }
                None => break,
            }
        }

        inner.order.push_back(key.clone());
        inner.entries.insert(key, entry);
    }

    /// Remove every entry belonging to `identity`. Returns the number removed.
    pub async fn clear_identity(&self, identity: &str) -> usize {
        let mut inner = self.inner.lock().await;
        let before = inner.entries.len();
        inner.entries.retain(|key, _| key.identity != identity);
        inner.order.retain(|key| key.identity != identity);
        before - inner.entries.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(identity: &str, text: &str) -> CacheKey {
        CacheKey::derive(identity, Surface::Public, text, "")
    }

    #[test]
    fn test_key_derivation_normalizes() {
        assert_eq!(key("u1", "What  is the WEATHER"), key("u1", " what is the weather "));
        assert_ne!(key("u1", "a"), key("u2", "a"));
        assert_ne!(
            CacheKey::derive("u1", Surface::Public, "a", ""),
            CacheKey::derive("u1", Surface::Private, "a", "")
        );
        assert_ne!(
            CacheKey::derive("u1", Surface::Public, "a", "room-1"),
            CacheKey::derive("u1", Surface::Public, "a", "room-2")
        );
        assert_eq!(key("u1", "a").content_hash.len(), 32);
    }

    #[tokio::test]
    async fn test_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(30), 10);
        let t0 = Instant::now();
        cache.put_at(key("u1", "q"), "answer".to_string(), t0).await;

        assert_eq!(
            cache.get_at(&key("u1", "q"), t0 + Duration::from_secs(29)).await.as_deref(),
            Some("answer")
        );
        assert!(cache.get_at(&key("u1", "q"), t0 + Duration::from_secs(30)).await.is_none());
        // stale entries are not removed by reads
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_eviction_is_insertion_order_not_lru() {
        let cache = ResponseCache::new(Duration::from_secs(30), 3);
        for q in ["a", "b", "c"] {
            cache.put(key("u1", q), q.to_string()).await;
        }

        // reading "a" must not protect it
        assert!(cache.get(&key("u1", "a")).await.is_some());
        cache.put(key("u1", "d"), "d".to_string()).await;

        assert_eq!(cache.len().await, 3);
        assert!(cache.get(&key("u1", "a")).await.is_none());
        assert!(cache.get(&key("u1", "b")).await.is_some());
        assert!(cache.get(&key("u1", "d")).await.is_some());
    }

    #[tokio::test]
    async fn test_rewrite_keeps_position() {
        let cache = ResponseCache::new(Duration::from_secs(30), 2);
        cache.put(key("u1", "a"), "a1".to_string()).await;
        cache.put(key("u1", "b"), "b".to_string()).await;
        cache.put(key("u1", "a"), "a2".to_string()).await;
        assert_eq!(cache.get(&key("u1", "a")).await.as_deref(), Some("a2"));

        cache.put(key("u1", "c"), "c".to_string()).await;
        assert!(cache.get(&key("u1", "a")).await.is_none());
        assert!(cache.get(&key("u1", "b")).await.is_some());
    }

    #[tokio::test]
    async fn test_clear_identity() {
        let cache = ResponseCache::new(Duration::from_secs(30), 10);
        cache.put(key("u1", "a"), "a".to_string()).await;
        cache.put(key("u1", "b"), "b".to_string()).await;
        cache.put(key("u2", "a"), "a".to_string()).await;

        assert_eq!(cache.clear_identity("u1").await, 2);
        assert_eq!(cache.len().await, 1);
        assert!(cache.get(&key("u2", "a")).await.is_some());
    }

    #[tokio::test]
    async fn test_zero_capacity_disables_cache() {
        let cache = ResponseCache::new(Duration::from_secs(30), 0);
        cache.put(key("u1", "a"), "a".to_string()).await;
        assert!(cache.is_empty().await);
    }
}
