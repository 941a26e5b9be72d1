//! Provider over a fixed list of agents.

use std::sync::{Arc, OnceLock};
use tracing::warn;

use crate::domain::models::ProviderCacheConfig;
use crate::domain::ports::{Agent, AgentScheduler, AgentSchedulerAware, Provider};

/// A provider backed by a fixed list of agents.
///
/// Accepts one scheduler injection and exposes it to callers that need to
/// scope work to the agents this node owns.
pub struct DefaultProvider {
    name: String,
    agents: Vec<Arc<dyn Agent>>,
    cache_config: ProviderCacheConfig,
    scheduler: OnceLock<Arc<dyn AgentScheduler>>,
}

impl DefaultProvider {
    /// Provider `name` owning `agents`.
    pub fn new(name: impl Into<String>, agents: Vec<Arc<dyn Agent>>) -> Self {
        Self {
            name: name.into(),
            agents,
            cache_config: ProviderCacheConfig::default(),
            scheduler: OnceLock::new(),
        }
    }

    pub fn with_cache_configuration(mut self, config: ProviderCacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Scheduler injected at bind time.
    pub fn scheduler(&self) -> Option<Arc<dyn AgentScheduler>> {
        self.scheduler.get().cloned()
    }
}

impl Provider for DefaultProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    fn agents(&self) -> Vec<Arc<dyn Agent>> {
        self.agents.clone()
    }

    fn cache_configuration(&self) -> ProviderCacheConfig {
        self.cache_config.clone()
    }

    fn scheduler_aware(&self) -> Option<&dyn AgentSchedulerAware> {
        Some(self)
    }
}

impl AgentSchedulerAware for DefaultProvider {
    fn set_agent_scheduler(&self, scheduler: Arc<dyn AgentScheduler>) {
        if self.scheduler.set(scheduler).is_err() {
            warn!(provider = %self.name, "Scheduler already injected, keeping the first one");
        }
    }
}
