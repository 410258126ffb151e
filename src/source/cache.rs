//! LRU cache of fetched baselines.
//!
//! Cached networks are handed out as `Arc<Vec<Segment>>` and never mutated,
//! so concurrent simulations share them without further locking.

use lru::LruCache;
use parking_lot::RwLock;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{AreaQuery, NetworkSource};
use crate::types::Segment;

/// Cache configuration.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Maximum number of cached networks.
    pub max_entries: usize,
    /// Whether to cache at all.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 32,
            enabled: true,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CacheStats {
    /// Current number of entries.
    pub len: usize,
    /// Maximum capacity.
    pub cap: usize,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that went to the source.
    pub misses: u64,
}

/// Read-through cache keyed by area query and feature limit.
pub struct BaselineCache {
    entries: Option<RwLock<LruCache<String, Arc<Vec<Segment>>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl BaselineCache {
    /// Create a cache.
    pub fn new(config: CacheConfig) -> Self {
        let entries = config.enabled.then(|| {
            let size = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
            RwLock::new(LruCache::new(size))
        });
        Self {
            entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached network for `area`, fetching it on a miss.
    ///
    /// Fetch errors are returned as-is and nothing is cached for them.
    pub async fn get_or_fetch<S: NetworkSource>(
        &self,
        source: &S,
        area: &AreaQuery,
        max_features: usize,
    ) -> Result<Arc<Vec<Segment>>, S::Error> {
        let key = format!("{}|{}", area.cache_key(), max_features);

        let cached = self
            .entries
            .as_ref()
            .and_then(|entries| entries.read().peek(&key).cloned());
        if let Some(hit) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let fetched = Arc::new(source.fetch(area, max_features).await?);
        tracing::debug!(area = %area, segments = fetched.len(), "baseline fetched");

        if let Some(entries) = &self.entries {
            entries.write().put(key, Arc::clone(&fetched));
        }
        Ok(fetched)
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        let (len, cap) = self
            .entries
            .as_ref()
            .map(|e| {
                let e = e.read();
                (e.len(), e.cap().get())
            })
            .unwrap_or((0, 0));
        CacheStats {
            len,
            cap,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drop every cached network.
    pub fn clear(&self) {
        if let Some(entries) = &self.entries {
            entries.write().clear();
        }
    }
}

impl Default for BaselineCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryNetworkSource;
    use crate::types::FunctionalClass;
    use geo::LineString;

    fn source() -> InMemoryNetworkSource {
        InMemoryNetworkSource::new()
            .with_place(
                "p",
                vec![Segment::new(
                    "a",
                    FunctionalClass::default(),
                    LineString::from(vec![(0.0, 0.0), (0.001, 0.0)]),
                    111.0,
                )],
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_second_fetch_is_a_hit() {
        let cache = BaselineCache::default();
        let src = source();
        let area = AreaQuery::Place("p".into());

        let first = cache.get_or_fetch(&src, &area, 10).await.unwrap();
        let second = cache.get_or_fetch(&src, &area, 10).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.len), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_disabled_cache_always_fetches() {
        let cache = BaselineCache::new(CacheConfig { max_entries: 4, enabled: false });
        let src = source();
        let area = AreaQuery::Place("p".into());

        cache.get_or_fetch(&src, &area, 10).await.unwrap();
        cache.get_or_fetch(&src, &area, 10).await.unwrap();
        assert_eq!(cache.stats().misses, 2);
        assert_eq!(cache.stats().cap, 0);
    }

    #[tokio::test]
    async fn test_errors_not_cached() {
        let cache = BaselineCache::default();
        let src = source();
        let area = AreaQuery::Place("missing".into());

        assert!(cache.get_or_fetch(&src, &area, 10).await.is_err());
        assert_eq!(cache.stats().len, 0);
    }
}
