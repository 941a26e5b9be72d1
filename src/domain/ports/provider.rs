//! Provider port.

use std::sync::Arc;

use super::agent::Agent;
use super::agent_scheduler::AgentSchedulerAware;
use crate::domain::models::ProviderCacheConfig;

/// A named group of agents sharing one cache.
pub trait Provider: Send + Sync {
    /// Name shared by the provider's cache and its agents.
    fn provider_name(&self) -> &str;

    fn agents(&self) -> Vec<Arc<dyn Agent>>;

    /// How the provider's cache treats authoritative results.
    fn cache_configuration(&self) -> ProviderCacheConfig {
        ProviderCacheConfig::default()
    }

    /// Present when the provider wants a handle to the scheduler.
    fn scheduler_aware(&self) -> Option<&dyn AgentSchedulerAware> {
        None
    }
}
