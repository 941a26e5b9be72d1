//! Caching agent replaying fixture cycles in place of a cloud SDK.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::template::{AgentTemplate, CycleTemplate, ResourceTemplate};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AccountScope, AgentDataType, CacheData, CacheResult, CustomSchedule, Keys,
};
use crate::domain::ports::{Agent, AgentExecution, Cache, CachingAgent};
use crate::services::cache_execution::CacheExecution;
use crate::services::provider_registry::ProviderRegistry;

/// Caching agent that replays a fixture's cycles in order, repeating the last one.
pub struct FixtureCachingAgent {
    agent_type: String,
    provider: String,
    template: AgentTemplate,
    runs: AtomicUsize,
}

impl FixtureCachingAgent {
    /// Agent for `provider` built from a fixture template.
    pub fn new(provider: impl Into<String>, template: AgentTemplate) -> Self {
        let agent_type = match (&template.agent_type, &template.region) {
            (Some(agent_type), _) => agent_type.clone(),
            (None, Some(region)) => format!("{}/{region}/{}", template.account, template.name),
            (None, None) => format!("{}/{}", template.account, template.name),
        };
        Self {
            agent_type,
            provider: provider.into(),
            template,
            runs: AtomicUsize::new(0),
        }
    }

    /// Structured id of a resource in `namespace`.
    pub fn key(&self, namespace: &str, resource: &str) -> String {
        let mut parts = vec![self.template.account.as_str()];
        if let Some(region) = &self.template.region {
            parts.push(region);
        }
        parts.push(resource);
        Keys::build(&self.provider, namespace, &parts)
    }

    /// Cycles loaded so far.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::Acquire)
    }

    fn next_cycle(&self) -> Option<&CycleTemplate> {
        let run = self.runs.fetch_add(1, Ordering::AcqRel);
        let cycles = &self.template.cycles;
        cycles.get(run.min(cycles.len().saturating_sub(1)))
    }

    fn to_cache_data(&self, namespace: &str, resource: &ResourceTemplate) -> CacheData {
        let mut data = CacheData::new(self.key(namespace, &resource.id))
            .with_attributes(resource.attributes.clone());
        for (relationship, targets) in &resource.relationships {
            data = data.with_relationship(
                relationship.clone(),
                targets.iter().map(|target| self.key(relationship, target)),
            );
        }
        if let Some(ttl) = resource.ttl_seconds {
            data = data.with_ttl_seconds(ttl);
        }
        data
    }
}

impl Agent for FixtureCachingAgent {
    fn agent_type(&self) -> &str {
        &self.agent_type
    }

    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn account_scope(&self) -> Option<AccountScope> {
        Some(AccountScope {
            account: self.template.account.clone(),
            region: self.template.region.clone(),
        })
    }

    fn custom_schedule(&self) -> Option<CustomSchedule> {
        let schedule = CustomSchedule {
            interval: self.template.interval_ms.map(Duration::from_millis),
            error_interval: self.template.error_interval_ms.map(Duration::from_millis),
            timeout: self.template.timeout_ms.map(Duration::from_millis),
        };
        (schedule != CustomSchedule::default()).then_some(schedule)
    }

    fn agent_execution(
        self: Arc<Self>,
        registry: &ProviderRegistry,
    ) -> DomainResult<Arc<dyn AgentExecution>> {
        CacheExecution::bind(self, registry)
    }
}

#[async_trait]
impl CachingAgent for FixtureCachingAgent {
    fn provided_data_types(&self) -> Vec<AgentDataType> {
        self.template.data_types.clone()
    }

    async fn load_data(&self, _cache: &dyn Cache) -> DomainResult<CacheResult> {
        if self.template.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.template.latency_ms)).await;
        }

        let Some(cycle) = self.next_cycle() else {
            return Ok(CacheResult::new());
        };
        if let Some(failure) = &cycle.failure {
            return Err(DomainError::provider(&self.agent_type, failure.clone()));
        }

        let mut result = CacheResult::new();
        for (namespace, resources) in &cycle.resources {
            let items = resources
                .iter()
                .map(|resource| self.to_cache_data(namespace, resource))
                .collect();
            result = result.with_items(namespace.clone(), items);
        }
        for (namespace, ids) in &cycle.evictions {
            result = result.with_evictions(
                namespace.clone(),
                ids.iter().map(|id| self.key(namespace, id)).collect::<Vec<_>>(),
            );
        }

        debug!(agent_type = %self.agent_type, items = result.total_items(), "Fixture cycle replayed");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryCache;
    use crate::domain::models::CacheConfig;
    use std::collections::{BTreeMap, HashMap};

    fn template(cycles: Vec<CycleTemplate>) -> AgentTemplate {
        AgentTemplate {
            agent_type: None,
            account: "prod".into(),
            region: Some("us-east-1".into()),
            name: "Instances".into(),
            data_types: vec![AgentDataType::authoritative("instances")],
            interval_ms: None,
            error_interval_ms: None,
            timeout_ms: None,
            latency_ms: 0,
            cycles,
        }
    }

    fn resource(id: &str) -> ResourceTemplate {
        ResourceTemplate {
            id: id.into(),
            attributes: HashMap::from([("state".to_string(), serde_json::json!("running"))]),
            relationships: BTreeMap::from([("loadBalancers".to_string(), vec!["lb-1".to_string()])]),
            ttl_seconds: None,
        }
    }

    #[test]
    fn test_agent_type_and_keys() {
        let agent = FixtureCachingAgent::new("aws", template(vec![]));
        assert_eq!(agent.agent_type(), "prod/us-east-1/Instances");
        assert_eq!(agent.key("instances", "i-1"), "aws:instances:prod:us-east-1:i-1");
        assert!(agent.custom_schedule().is_none());
        assert_eq!(agent.account_scope().unwrap().region.as_deref(), Some("us-east-1"));
    }

    #[tokio::test]
    async fn test_cycles_advance_and_last_repeats() {
        let cycles = vec![
            CycleTemplate {
                resources: BTreeMap::from([(
                    "instances".to_string(),
                    vec![resource("i-1"), resource("i-2")],
                )]),
                ..CycleTemplate::default()
            },
            CycleTemplate {
                failure: Some("throttled".into()),
                ..CycleTemplate::default()
            },
        ];
        let agent = FixtureCachingAgent::new("aws", template(cycles));
        let cache = InMemoryCache::new("aws", CacheConfig::default());

        let first = agent.load_data(&cache).await.unwrap();
        let instances = first.items("instances");
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].id, "aws:instances:prod:us-east-1:i-1");
        assert_eq!(
            instances[0].related("loadBalancers").collect::<Vec<_>>(),
            vec!["aws:loadBalancers:prod:us-east-1:lb-1"]
        );

        for _ in 0..2 {
            let err = agent.load_data(&cache).await.unwrap_err();
            assert!(matches!(err, DomainError::Provider { .. }));
        }
        assert_eq!(agent.runs(), 3);
    }

    #[tokio::test]
    async fn test_no_cycles_yields_empty_result() {
        let agent = FixtureCachingAgent::new("aws", template(vec![]));
        let cache = InMemoryCache::new("aws", CacheConfig::default());
        assert!(agent.load_data(&cache).await.unwrap().is_empty());
    }
}
