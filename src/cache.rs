//! # Result Cache Module
//!
//! ## Purpose
//! Explicit TTL cache objects handed to the orchestrators instead of
//! module-level singleton maps, keeping the core testable without
//! process-wide state. Same get/put/clear contract as the global caches it
//! replaces.
//!
//! ## Input/Output Specification
//! - **Input**: String keys (`site:kind:query`), cloneable values
//! - **Output**: Cached values younger than the TTL
//! - **Eviction**: Oldest entry is dropped once the size cap is reached

use crate::config::CacheConfig;
use crate::infobox::ParsedCountryData;
use crate::{ImageSearchPage, SearchResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// One TTL cache for a single value type
pub struct WikiCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    enabled: bool,
    ttl_seconds: i64,
    max_entries: usize,
}

struct CacheEntry<V> {
    value: V,
    inserted_at: DateTime<Utc>,
}

impl<V: Clone> WikiCache<V> {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            enabled: config.enabled,
            ttl_seconds: config.ttl_seconds as i64,
            max_entries: config.max_entries.max(1),
        }
    }

    /// Fetch a value if present and not expired.
    pub async fn get(&self, key: &str) -> Option<V> {
        if !self.enabled {
            return None;
        }
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        let age = Utc::now()
            .signed_duration_since(entry.inserted_at)
            .num_seconds();
        if age < self.ttl_seconds {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Store a value, evicting the oldest entry at capacity.
    pub async fn put(&self, key: String, value: V) {
        if !self.enabled {
            return;
        }
        let mut entries = self.entries.write().await;
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(key, _)| key.clone())
            {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Utc::now(),
            },
        );
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Current entry count.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// The cache set shared by orchestrator instances
pub struct SearchCaches {
    /// Ranked text results per query
    pub pages: WikiCache<Vec<SearchResult>>,
    /// Ranked image pages per query
    pub images: WikiCache<ImageSearchPage>,
    /// Extracted country records per page title
    pub countries: WikiCache<ParsedCountryData>,
}

impl SearchCaches {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            pages: WikiCache::new(config),
            images: WikiCache::new(config),
            countries: WikiCache::new(config),
        }
    }

    /// Clear all three caches.
    pub async fn clear_all(&self) {
        self.pages.clear().await;
        self.images.clear().await;
        self.countries.clear().await;
    }
}

/// Build the cache key for one site + request kind + query.
pub fn cache_key(site: crate::config::WikiSiteId, kind: &str, query: &str) -> String {
    format!("{}:{}:{}", site, kind, query.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(ttl_seconds: u64, max_entries: usize) -> CacheConfig {
        CacheConfig {
            enabled: true,
            ttl_seconds,
            max_entries,
        }
    }

    #[tokio::test]
    async fn get_put_clear_contract() {
        let cache: WikiCache<String> = WikiCache::new(&config(60, 8));
        assert!(cache.get("k").await.is_none());
        cache.put("k".to_string(), "v".to_string()).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v"));
        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn zero_ttl_expires_immediately() {
        let cache: WikiCache<u32> = WikiCache::new(&config(0, 8));
        cache.put("k".to_string(), 7).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn capacity_evicts_oldest() {
        let cache: WikiCache<u32> = WikiCache::new(&config(60, 2));
        cache.put("a".to_string(), 1).await;
        cache.put("b".to_string(), 2).await;
        cache.put("c".to_string(), 3).await;
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get("c").await, Some(3));
    }

    #[tokio::test]
    async fn disabled_cache_stores_nothing() {
        let mut cfg = config(60, 8);
        cfg.enabled = false;
        let cache: WikiCache<u32> = WikiCache::new(&cfg);
        cache.put("k".to_string(), 1).await;
        assert!(cache.get("k").await.is_none());
    }
}
