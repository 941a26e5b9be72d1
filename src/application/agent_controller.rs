//! Composition-time binding of providers and agents to a scheduler.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::errors::DomainResult;
use crate::domain::ports::{AgentScheduler, ExecutionInstrumentation};
use crate::services::provider_registry::ProviderRegistry;

/// Outcome of a bind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindReport {
    /// Agents the scheduler accepted.
    pub scheduled: usize,
    /// Agents whose execution could not be built or that the scheduler refused.
    pub failed: usize,
}

/// Binds a provider registry to a scheduler, once.
pub struct AgentController;

impl AgentController {
    /// Hand every agent in the registry to the scheduler. Runs once per registry.
    ///
    /// Providers and agents that expose `AgentSchedulerAware` receive the
    /// scheduler first. An agent whose execution cannot be built, or that the
    /// scheduler refuses, is logged, counted in `failed` and skipped; the rest
    /// are still scheduled. The registry stays bound either way.
    pub async fn bind(
        registry: &ProviderRegistry,
        scheduler: Arc<dyn AgentScheduler>,
        instrumentation: Arc<dyn ExecutionInstrumentation>,
    ) -> DomainResult<BindReport> {
        registry.mark_bound()?;

        for (agent_type, count) in registry.duplicate_agent_types() {
            warn!(
                agent_type = %agent_type,
                count,
                "Agent type registered more than once, later agents replace earlier ones"
            );
        }

        let mut report = BindReport::default();
        for provider in registry.providers() {
            if let Some(aware) = provider.scheduler_aware() {
                aware.set_agent_scheduler(Arc::clone(&scheduler));
            }

            for agent in provider.agents() {
                if let Some(aware) = agent.scheduler_aware() {
                    aware.set_agent_scheduler(Arc::clone(&scheduler));
                }

                let execution = match Arc::clone(&agent).agent_execution(registry) {
                    Ok(execution) => execution,
                    Err(e) => {
                        error!(
                            agent_type = %agent.agent_type(),
                            provider = %provider.provider_name(),
                            error = %e,
                            "Could not build agent execution, skipping agent"
                        );
                        report.failed += 1;
                        continue;
                    }
                };

                let agent_type = agent.agent_type().to_string();
                match scheduler
                    .schedule(agent, execution, Arc::clone(&instrumentation))
                    .await
                {
                    Ok(()) => report.scheduled += 1,
                    Err(e) => {
                        error!(
                            agent_type = %agent_type,
                            provider = %provider.provider_name(),
                            error = %e,
                            "Scheduler refused agent, skipping agent"
                        );
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            scheduled = report.scheduled,
            failed = report.failed,
            atomic = scheduler.is_atomic(),
            "Agents bound to scheduler"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryNamedCacheFactory;
    use crate::application::scheduler::test_support::{CountingInstrumentation, StubAgent};
    use crate::application::scheduler::DefaultAgentScheduler;
    use crate::application::worker_pool::{WorkerPool, WorkerPoolConfig};
    use crate::domain::errors::DomainError;
    use crate::domain::models::AgentInterval;
    use crate::domain::ports::{Agent, AgentExecution, Provider, ScheduledAgentStatus};
    use async_trait::async_trait;
    use crate::services::default_provider::DefaultProvider;
    use crate::services::interval_provider::AgentIntervalProvider;
    use std::time::Duration;

    fn scheduler() -> Arc<DefaultAgentScheduler> {
        let pool = Arc::new(WorkerPool::new(WorkerPoolConfig::new("bind", 1, 8)));
        let intervals = AgentIntervalProvider::new(AgentInterval::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
            Duration::from_secs(10),
        ));
        Arc::new(DefaultAgentScheduler::new(pool, intervals))
    }

    #[tokio::test(start_paused = true)]
    async fn test_bind_schedules_every_agent_and_injects_scheduler() {
        let agents: Vec<Arc<dyn Agent>> = vec![
            StubAgent::new("aws/us-east-1/Instances") as Arc<dyn Agent>,
            StubAgent::new("aws/us-east-1/LoadBalancers") as Arc<dyn Agent>,
        ];
        let provider = Arc::new(DefaultProvider::new("stub", agents));
        let registry = ProviderRegistry::new(
            vec![Arc::clone(&provider) as Arc<dyn Provider>],
            &InMemoryNamedCacheFactory::default(),
        );
        let scheduler = scheduler();

        let report = AgentController::bind(
            &registry,
            scheduler.clone(),
            Arc::new(CountingInstrumentation::default()),
        )
        .await
        .unwrap();

        assert_eq!(report, BindReport { scheduled: 2, failed: 0 });
        assert!(registry.is_bound());
        assert!(provider.scheduler().is_some());
        assert_eq!(scheduler.snapshot().await.len(), 2);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_bind_is_rejected() {
        let provider: Arc<dyn Provider> = Arc::new(DefaultProvider::new(
            "stub",
            vec![StubAgent::new("aws/us-east-1/Instances") as Arc<dyn Agent>],
        ));
        let registry = ProviderRegistry::new(vec![provider], &InMemoryNamedCacheFactory::default());
        let scheduler = scheduler();
        let instrumentation = Arc::new(CountingInstrumentation::default());

        AgentController::bind(&registry, scheduler.clone(), instrumentation.clone())
            .await
            .unwrap();
        let second = AgentController::bind(&registry, scheduler.clone(), instrumentation).await;

        assert!(matches!(second, Err(DomainError::AlreadyBound)));
        assert_eq!(scheduler.snapshot().await.len(), 1);
        scheduler.shutdown().await;
    }

    /// Delegates to a real scheduler but refuses one agent type.
    struct Refusing {
        refused: &'static str,
        inner: Arc<DefaultAgentScheduler>,
    }

    #[async_trait]
    impl AgentScheduler for Refusing {
        async fn schedule(
            &self,
            agent: Arc<dyn Agent>,
            execution: Arc<dyn AgentExecution>,
            instrumentation: Arc<dyn ExecutionInstrumentation>,
        ) -> DomainResult<()> {
            if agent.agent_type() == self.refused {
                return Err(DomainError::PoolClosed("bind".into()));
            }
            self.inner.schedule(agent, execution, instrumentation).await
        }

        async fn unschedule(&self, agent_type: &str) -> DomainResult<()> {
            self.inner.unschedule(agent_type).await
        }

        fn is_atomic(&self) -> bool {
            false
        }

        async fn owns(&self, agent_type: &str) -> bool {
            self.inner.owns(agent_type).await
        }

        async fn snapshot(&self) -> Vec<ScheduledAgentStatus> {
            self.inner.snapshot().await
        }

        async fn shutdown(&self) {
            self.inner.shutdown().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_agent_does_not_abort_bind() {
        let agents: Vec<Arc<dyn Agent>> = vec![
            StubAgent::new("aws/us-east-1/Instances") as Arc<dyn Agent>,
            StubAgent::new("aws/us-east-1/LoadBalancers") as Arc<dyn Agent>,
            StubAgent::new("aws/us-east-1/ServerGroups") as Arc<dyn Agent>,
        ];
        let provider: Arc<dyn Provider> = Arc::new(DefaultProvider::new("stub", agents));
        let registry = ProviderRegistry::new(vec![provider], &InMemoryNamedCacheFactory::default());
        let scheduler = Arc::new(Refusing {
            refused: "aws/us-east-1/LoadBalancers",
            inner: scheduler(),
        });

        let report = AgentController::bind(
            &registry,
            scheduler.clone(),
            Arc::new(CountingInstrumentation::default()),
        )
        .await
        .unwrap();

        assert_eq!(report, BindReport { scheduled: 2, failed: 1 });
        assert!(registry.is_bound());
        let scheduled: Vec<String> = scheduler
            .snapshot()
            .await
            .into_iter()
            .map(|status| status.agent_type)
            .collect();
        assert_eq!(scheduled.len(), 2);
        assert!(!scheduled.iter().any(|agent_type| agent_type.ends_with("LoadBalancers")));
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_agent_types_share_one_slot() {
        let provider: Arc<dyn Provider> = Arc::new(DefaultProvider::new(
            "stub",
            vec![
                StubAgent::new("aws/us-east-1/Instances") as Arc<dyn Agent>,
                StubAgent::new("aws/us-east-1/Instances") as Arc<dyn Agent>,
            ],
        ));
        let registry = ProviderRegistry::new(vec![provider], &InMemoryNamedCacheFactory::default());
        assert_eq!(registry.duplicate_agent_types().get("aws/us-east-1/Instances"), Some(&2));

        let scheduler = scheduler();
        let report = AgentController::bind(
            &registry,
            scheduler.clone(),
            Arc::new(CountingInstrumentation::default()),
        )
        .await
        .unwrap();

        assert_eq!(report.scheduled, 2);
        assert_eq!(scheduler.snapshot().await.len(), 1);
        scheduler.shutdown().await;
    }
}
