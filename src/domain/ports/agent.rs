//! Agent ports.

use async_trait::async_trait;
use std::sync::Arc;

use super::agent_scheduler::AgentSchedulerAware;
use super::cache::Cache;
use crate::domain::errors::DomainResult;
use crate::domain::models::{AccountScope, AgentDataType, CacheResult, CustomSchedule, StoreSummary};
use crate::services::provider_registry::ProviderRegistry;

/// A unit of periodic work, scheduled by its agent type.
pub trait Agent: Send + Sync {
    /// Scheduling key, unique fleet-wide for a provider/account/region/resource,
    /// e.g. `aws/us-east-1/Instances`.
    fn agent_type(&self) -> &str;

    /// Name of the provider whose cache this agent writes to.
    fn provider_name(&self) -> &str;

    /// Account and region this agent covers, if it is scoped to one.
    fn account_scope(&self) -> Option<AccountScope> {
        None
    }

    /// Overrides of the configured interval, error interval or timeout.
    fn custom_schedule(&self) -> Option<CustomSchedule> {
        None
    }

    /// Present when the agent wants a handle to the scheduler.
    fn scheduler_aware(&self) -> Option<&dyn AgentSchedulerAware> {
        None
    }

    /// Bind this agent to the registry, producing the execution the scheduler runs.
    fn agent_execution(
        self: Arc<Self>,
        registry: &ProviderRegistry,
    ) -> DomainResult<Arc<dyn AgentExecution>>;
}

/// An agent that polls a provider and writes normalized entries to its cache.
#[async_trait]
pub trait CachingAgent: Agent {
    /// Namespaces this agent writes and its authority over each.
    fn provided_data_types(&self) -> Vec<AgentDataType>;

    /// Call the provider and build this cycle's result.
    ///
    /// `cache` is the provider's cache, for lookups of entries written by other
    /// agents.
    async fn load_data(&self, cache: &dyn Cache) -> DomainResult<CacheResult>;
}

/// One run of an agent, split into a load and a store phase.
#[async_trait]
pub trait AgentExecution: Send + Sync {
    /// Produce this cycle's result. `None` means there is nothing to store.
    async fn load(&self) -> DomainResult<Option<CacheResult>>;

    /// Apply a result produced by `load`.
    async fn store(&self, result: CacheResult) -> DomainResult<StoreSummary>;

    /// Load, then store when the load produced a result.
    async fn execute(&self) -> DomainResult<StoreSummary> {
        match self.load().await? {
            Some(result) => self.store(result).await,
            None => Ok(StoreSummary::default()),
        }
    }
}
