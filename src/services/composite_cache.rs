//! Read-only view over every provider cache.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::provider_cache::ProviderCache;
use crate::domain::errors::DomainResult;
use crate::domain::models::{CacheData, CacheFilter};
use crate::domain::ports::Cache;

/// Combines reads across provider caches.
///
/// An id present in several caches is returned once, with attributes from
/// every source (later providers win on conflicting keys) and relationship
/// sets unioned.
pub struct CompositeCache {
    caches: Vec<Arc<ProviderCache>>,
}

impl CompositeCache {
    /// View over `caches`, merged in this order.
    pub fn new(caches: Vec<Arc<ProviderCache>>) -> Self {
        Self { caches }
    }
}

fn combine(into: &mut CacheData, other: CacheData) {
    into.attributes.extend(other.attributes);
    for (relationship, ids) in other.relationships {
        into.relationships.entry(relationship).or_default().extend(ids);
    }
}

#[async_trait]
impl Cache for CompositeCache {
    async fn get_all_by_ids(
        &self,
        namespace: &str,
        ids: &[String],
        filter: Option<&CacheFilter>,
    ) -> DomainResult<Vec<CacheData>> {
        let mut combined: HashMap<String, CacheData> = HashMap::new();
        for cache in &self.caches {
            for item in cache.get_all_by_ids(namespace, ids, filter).await? {
                match combined.get_mut(&item.id) {
                    Some(existing) => combine(existing, item),
                    None => {
                        combined.insert(item.id.clone(), item);
                    }
                }
            }
        }
        let mut items: Vec<CacheData> = combined.into_values().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn get_identifiers(&self, namespace: &str) -> DomainResult<Vec<String>> {
        let mut ids = BTreeSet::new();
        for cache in &self.caches {
            ids.extend(cache.get_identifiers(namespace).await?);
        }
        Ok(ids.into_iter().collect())
    }
}
