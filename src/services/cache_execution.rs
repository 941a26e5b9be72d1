//! Load and store of a caching agent against its provider cache.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::provider_cache::ProviderCache;
use super::provider_registry::ProviderRegistry;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{authoritative_types, CacheResult, StoreSummary};
use crate::domain::ports::{AgentExecution, CachingAgent};

/// Execution of a `CachingAgent` against its provider's cache.
pub struct CacheExecution {
    agent: Arc<dyn CachingAgent>,
    cache: Arc<ProviderCache>,
}

impl CacheExecution {
    /// Execution of `agent` storing into `cache`.
    pub fn new(agent: Arc<dyn CachingAgent>, cache: Arc<ProviderCache>) -> Self {
        Self { agent, cache }
    }

    /// Resolve the agent's provider cache from the registry.
    pub fn bind(
        agent: Arc<dyn CachingAgent>,
        registry: &ProviderRegistry,
    ) -> DomainResult<Arc<dyn AgentExecution>> {
        let cache = registry
            .provider_cache(agent.provider_name())
            .ok_or_else(|| DomainError::UnknownProvider(agent.provider_name().to_string()))?;
        Ok(Arc::new(Self::new(agent, cache)))
    }
}

#[async_trait]
impl AgentExecution for CacheExecution {
    async fn load(&self) -> DomainResult<Option<CacheResult>> {
        let result = self.agent.load_data(self.cache.as_ref()).await?;
        debug!(
            agent_type = self.agent.agent_type(),
            items = result.total_items(),
            "Agent data loaded"
        );
        Ok(Some(result))
    }

    async fn store(&self, result: CacheResult) -> DomainResult<StoreSummary> {
        let authoritative = authoritative_types(&self.agent.provided_data_types());
        self.cache
            .put_cache_result(self.agent.agent_type(), &authoritative, result)
            .await
    }
}
