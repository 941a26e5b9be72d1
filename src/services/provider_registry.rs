//! Provider registry: the fixed set of providers and their caches.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use super::composite_cache::CompositeCache;
use super::provider_cache::ProviderCache;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ProviderCacheConfig;
use crate::domain::ports::{NamedCacheFactory, Provider};

/// Assembled once at startup and treated as immutable afterwards.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
    caches: HashMap<String, Arc<ProviderCache>>,
    composite: Arc<CompositeCache>,
    bound: AtomicBool,
}

impl ProviderRegistry {
    /// Build a registry using each provider's own cache configuration.
    pub fn new(providers: Vec<Arc<dyn Provider>>, cache_factory: &dyn NamedCacheFactory) -> Self {
        Self::with_cache_overrides(providers, cache_factory, &HashMap::new())
    }

    /// Build a registry where `overrides` replaces the cache configuration of
    /// the named providers.
    pub fn with_cache_overrides(
        providers: Vec<Arc<dyn Provider>>,
        cache_factory: &dyn NamedCacheFactory,
        overrides: &HashMap<String, ProviderCacheConfig>,
    ) -> Self {
        let mut caches = HashMap::new();
        let mut ordered = Vec::new();
        for provider in &providers {
            let name = provider.provider_name().to_string();
            let config = overrides
                .get(&name)
                .cloned()
                .unwrap_or_else(|| provider.cache_configuration());
            let cache = Arc::new(ProviderCache::new(
                name.clone(),
                cache_factory.get_cache(&name),
                config,
            ));
            ordered.push(Arc::clone(&cache));
            caches.insert(name, cache);
        }

        info!(providers = providers.len(), "Provider registry assembled");

        Self {
            providers,
            caches,
            composite: Arc::new(CompositeCache::new(ordered)),
            bound: AtomicBool::new(false),
        }
    }

    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    /// Cache of one provider, if registered.
    pub fn provider_cache(&self, provider_name: &str) -> Option<Arc<ProviderCache>> {
        self.caches.get(provider_name).cloned()
    }

    /// Read view over every provider's cache.
    pub fn cache(&self) -> Arc<CompositeCache> {
        Arc::clone(&self.composite)
    }

    /// Agents across all providers, duplicates included.
    pub fn agent_count(&self) -> usize {
        self.providers.iter().map(|p| p.agents().len()).sum()
    }

    /// Agent types registered by more than one agent, with their counts.
    ///
    /// Such agents share one lease and one scheduling slot.
    pub fn duplicate_agent_types(&self) -> BTreeMap<String, usize> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for provider in &self.providers {
            for agent in provider.agents() {
                *counts.entry(agent.agent_type().to_string()).or_default() += 1;
            }
        }
        counts.retain(|_, count| *count > 1);
        counts
    }

    /// Record that the registry was handed to a scheduler. Fails on the second call.
    pub fn mark_bound(&self) -> DomainResult<()> {
        self.bound
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| DomainError::AlreadyBound)
    }

    /// Whether an `AgentController` already bound this registry.
    pub fn is_bound(&self) -> bool {
        self.bound.load(Ordering::Acquire)
    }
}
