//! In-memory cache factory.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use super::cache::InMemoryCache;
use crate::domain::models::CacheConfig;
use crate::domain::ports::{NamedCacheFactory, WriteableCache};

/// Memoizes one `InMemoryCache` per name.
///
/// Concurrent first access may build more than one candidate; the first one
/// inserted wins and the others are dropped.
pub struct InMemoryNamedCacheFactory {
    config: CacheConfig,
    caches: DashMap<String, Arc<dyn WriteableCache>>,
}

impl InMemoryNamedCacheFactory {
    /// Factory whose caches all use `config`.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            caches: DashMap::new(),
        }
    }

    /// Names handed out so far, sorted.
    pub fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for InMemoryNamedCacheFactory {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl NamedCacheFactory for InMemoryNamedCacheFactory {
    fn get_cache(&self, name: &str) -> Arc<dyn WriteableCache> {
        if let Some(existing) = self.caches.get(name) {
            return Arc::clone(existing.value());
        }

        let candidate: Arc<dyn WriteableCache> =
            Arc::new(InMemoryCache::new(name, self.config.clone()));
        let cache = Arc::clone(self.caches.entry(name.to_string()).or_insert(candidate).value());
        debug!(cache = name, "Named cache resolved");
        cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_same_instance() {
        let factory = InMemoryNamedCacheFactory::default();
        let a = factory.get_cache("aws");
        let b = factory.get_cache("aws");
        let c = factory.get_cache("gce");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(factory.cache_names(), vec!["aws", "gce"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_first_access_yields_one_instance() {
        let factory = Arc::new(InMemoryNamedCacheFactory::default());
        let barrier = Arc::new(tokio::sync::Barrier::new(32));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let factory = Arc::clone(&factory);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    factory.get_cache("shared")
                })
            })
            .collect();

        let mut caches = Vec::new();
        for handle in handles {
            caches.push(handle.await.unwrap());
        }

        let first = &caches[0];
        assert!(caches.iter().all(|c| Arc::ptr_eq(first, c)));
        assert_eq!(factory.cache_names().len(), 1);
    }
}
