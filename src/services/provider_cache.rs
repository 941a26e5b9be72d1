//! Provider cache: applies agent results to a provider's backing store.
//!
//! Each caching cycle hands over a `CacheResult`. Items are merged first, then
//! for authoritative namespaces the ids this agent produced last cycle but not
//! this cycle are evicted. The ids produced per agent are recorded in the
//! reserved `_ALL_` namespace of the same store, one entry per source agent
//! with one relationship per namespace.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CacheData, CacheFilter, CacheResult, ProviderCacheConfig, StoreSummary};
use crate::domain::ports::{validate_namespace, Cache, CacheStats, WriteableCache};

/// Bookkeeping namespace holding the ids each source agent last produced.
pub const SOURCE_INDEX_NAMESPACE: &str = "_ALL_";

/// Cache of one provider, tracking which agent wrote each entry.
pub struct ProviderCache {
    provider: String,
    backing: Arc<dyn WriteableCache>,
    config: ProviderCacheConfig,
}

impl ProviderCache {
    /// Provider cache writing through `backing`.
    pub fn new(
        provider: impl Into<String>,
        backing: Arc<dyn WriteableCache>,
        config: ProviderCacheConfig,
    ) -> Self {
        Self {
            provider: provider.into(),
            backing,
            config,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn configuration(&self) -> &ProviderCacheConfig {
        &self.config
    }

    /// Counters of the backing store.
    pub fn stats(&self) -> CacheStats {
        self.backing.stats()
    }

    /// Ids `source` produced in `namespace` on its last applied cycle.
    pub async fn source_identifiers(&self, source: &str, namespace: &str) -> DomainResult<BTreeSet<String>> {
        let index = self.backing.get(SOURCE_INDEX_NAMESPACE, source).await?;
        Ok(index
            .and_then(|entry| entry.relationships.get(namespace).cloned())
            .unwrap_or_default())
    }

    /// Store one cycle's result produced by agent `source`.
    ///
    /// Namespaces in `authoritative_types` get eviction of stale ids; every
    /// other namespace in the result is merge-only. An authoritative namespace
    /// missing from the result counts as reported empty.
    pub async fn put_cache_result(
        &self,
        source: &str,
        authoritative_types: &[String],
        result: CacheResult,
    ) -> DomainResult<StoreSummary> {
        for namespace in result.cache_results.keys().chain(result.evictions.keys()) {
            check_writable(namespace)?;
        }
        for namespace in authoritative_types {
            check_writable(namespace)?;
        }

        let CacheResult {
            cache_results,
            mut evictions,
        } = result;

        let previous = self
            .backing
            .get(SOURCE_INDEX_NAMESPACE, source)
            .await?
            .map(|entry| entry.relationships)
            .unwrap_or_default();

        let mut summary = StoreSummary::default();
        let mut produced: HashMap<String, BTreeSet<String>> = HashMap::new();

        for (namespace, items) in cache_results {
            let ids: BTreeSet<String> = items.iter().map(|item| item.id.clone()).collect();
            summary.entry(&namespace).merged = items.len();
            self.backing.merge_all(&namespace, items).await?;
            produced.insert(namespace, ids);
        }

        let mut index = CacheData::new(source);
        let mut index_changed = false;

        for namespace in authoritative_types {
            let current = produced.remove(namespace).unwrap_or_default();
            let explicit = evictions.remove(namespace).unwrap_or_default();

            if current.is_empty() && !self.config.supports_full_eviction {
                summary.entry(namespace).eviction_skipped = true;
                debug!(
                    provider = %self.provider,
                    source,
                    namespace = %namespace,
                    "Empty authoritative result, evictions withheld"
                );
                continue;
            }

            let mut stale: Vec<String> = previous
                .get(namespace)
                .map(|ids| ids.difference(&current).cloned().collect())
                .unwrap_or_default();
            let already: HashSet<&String> = stale.iter().collect();
            let extra: Vec<String> = explicit
                .into_iter()
                .filter(|id| !current.contains(id) && !already.contains(id))
                .collect();
            stale.extend(extra);

            if !stale.is_empty() {
                self.backing.evict_all(namespace, &stale).await?;
            }
            summary.entry(namespace).evicted = stale.len();

            if previous.get(namespace) != Some(&current) {
                index.relationships.insert(namespace.clone(), current);
                index_changed = true;
            }
        }

        for (namespace, ids) in evictions {
            if !ids.is_empty() {
                warn!(
                    provider = %self.provider,
                    source,
                    namespace = %namespace,
                    ignored = ids.len(),
                    "Explicit evictions for a non-authoritative namespace ignored"
                );
            }
        }

        if index_changed {
            self.backing.merge(SOURCE_INDEX_NAMESPACE, index).await?;
        }

        debug!(
            provider = %self.provider,
            source,
            merged = summary.merged(),
            evicted = summary.evicted(),
            "Cache result stored"
        );
        Ok(summary)
    }
}

fn check_writable(namespace: &str) -> DomainResult<()> {
    validate_namespace(namespace)?;
    if namespace == SOURCE_INDEX_NAMESPACE {
        return Err(DomainError::InvalidNamespace(namespace.to_string()));
    }
    Ok(())
}

#[async_trait]
impl Cache for ProviderCache {
    async fn get_all_by_ids(
        &self,
        namespace: &str,
        ids: &[String],
        filter: Option<&CacheFilter>,
    ) -> DomainResult<Vec<CacheData>> {
        self.backing.get_all_by_ids(namespace, ids, filter).await
    }

    async fn get_identifiers(&self, namespace: &str) -> DomainResult<Vec<String>> {
        self.backing.get_identifiers(namespace).await
    }

    async fn get_all(&self, namespace: &str) -> DomainResult<Vec<CacheData>> {
        self.backing.get_all(namespace).await
    }

    async fn get_all_filtered(
        &self,
        namespace: &str,
        filter: &CacheFilter,
    ) -> DomainResult<Vec<CacheData>> {
        self.backing.get_all_filtered(namespace, filter).await
    }
}
