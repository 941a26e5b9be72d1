//! Application context for one CATS node.
//!
//! `CatsModule` owns everything a node needs: configuration, the cache
//! factory, the provider registry, the scheduler, instrumentation, the node
//! identity and, when sharding is enabled, the membership observer. It is
//! built once with [`CatsModule::builder`] and passed around explicitly.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::agent_controller::{AgentController, BindReport};
use super::scheduler::{AgentTypeFilter, ClusteredAgentScheduler, DefaultAgentScheduler};
use super::worker_pool::{WorkerPool, WorkerPoolConfig};
use crate::adapters::memory::{
    InMemoryLeaseStore, InMemoryMembershipRegistry, InMemoryNamedCacheFactory,
};
use crate::domain::errors::DomainResult;
use crate::domain::models::{Config, SchedulerKind};
use crate::domain::ports::{
    AgentScheduler, ExecutionInstrumentation, LeaseStore, MembershipRegistry, NamedCacheFactory,
    NodeStatusProvider, Provider, ShardingFilter,
};
use crate::services::composite_cache::CompositeCache;
use crate::services::instrumentation::{
    CompositeExecutionInstrumentation, LoggingExecutionInstrumentation,
    MetricsExecutionInstrumentation,
};
use crate::services::interval_provider::AgentIntervalProvider;
use crate::services::node_identity::{AlwaysEnabled, NodeIdentity};
use crate::services::provider_registry::ProviderRegistry;
use crate::services::sharding::{MembershipObserver, NoopShardingFilter, RendezvousShardingFilter};

/// Name prefix of the agent worker pool.
pub const AGENT_POOL_NAME: &str = "cats-agent";

/// Collects the parts of a [`CatsModule`]. Everything but providers has a default.
#[derive(Default)]
pub struct CatsModuleBuilder {
    config: Config,
    providers: Vec<Arc<dyn Provider>>,
    cache_factory: Option<Arc<dyn NamedCacheFactory>>,
    lease_store: Option<Arc<dyn LeaseStore>>,
    membership: Option<Arc<dyn MembershipRegistry>>,
    node_status: Option<Arc<dyn NodeStatusProvider>>,
    instrumentation: Vec<Arc<dyn ExecutionInstrumentation>>,
}

impl CatsModuleBuilder {
    /// Configuration to wire from. Defaults to `Config::default()`.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Add one provider.
    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Add several providers.
    pub fn providers(mut self, providers: impl IntoIterator<Item = Arc<dyn Provider>>) -> Self {
        self.providers.extend(providers);
        self
    }

    /// Replace the in-memory cache factory.
    pub fn cache_factory(mut self, factory: Arc<dyn NamedCacheFactory>) -> Self {
        self.cache_factory = Some(factory);
        self
    }

    /// Lease store shared with the rest of the fleet. Only used by the
    /// clustered scheduler.
    pub fn lease_store(mut self, leases: Arc<dyn LeaseStore>) -> Self {
        self.lease_store = Some(leases);
        self
    }

    /// Membership registry used for sharding. In-memory when unset.
    pub fn membership(mut self, membership: Arc<dyn MembershipRegistry>) -> Self {
        self.membership = Some(membership);
        self
    }

    /// Switch consulted before every lease poll.
    pub fn node_status(mut self, node_status: Arc<dyn NodeStatusProvider>) -> Self {
        self.node_status = Some(node_status);
        self
    }

    /// Extra instrumentation, run after the built-in logging and metrics hooks.
    pub fn instrumentation(mut self, instrumentation: Arc<dyn ExecutionInstrumentation>) -> Self {
        self.instrumentation.push(instrumentation);
        self
    }

    /// Assemble the module. Must be called from within a tokio runtime.
    pub fn build(self) -> DomainResult<CatsModule> {
        let config = self.config;
        let node = NodeIdentity::from_config(&config.node);
        let filter = AgentTypeFilter::from_config(&config.scheduler)?;

        let cache_factory = self
            .cache_factory
            .unwrap_or_else(|| Arc::new(InMemoryNamedCacheFactory::new(config.cache.clone())));
        let registry = Arc::new(ProviderRegistry::with_cache_overrides(
            self.providers,
            cache_factory.as_ref(),
            &config.providers,
        ));

        let metrics = Arc::new(MetricsExecutionInstrumentation::new());
        let mut composite = CompositeExecutionInstrumentation::new(vec![
            Arc::new(LoggingExecutionInstrumentation) as Arc<dyn ExecutionInstrumentation>,
            Arc::clone(&metrics) as Arc<dyn ExecutionInstrumentation>,
        ]);
        for extra in self.instrumentation {
            composite = composite.with(extra);
        }
        let instrumentation: Arc<dyn ExecutionInstrumentation> = Arc::new(composite);

        let pool = Arc::new(WorkerPool::new(
            WorkerPoolConfig::new(
                AGENT_POOL_NAME,
                config.scheduler.pool_size,
                config.scheduler.queue_capacity,
            )
            .with_rate_limit(config.scheduler.max_executions_per_second),
        ));
        let intervals = AgentIntervalProvider::from_config(&config.agent);

        let mut observer = None;
        let (scheduler, clustered): (Arc<dyn AgentScheduler>, Option<Arc<ClusteredAgentScheduler>>) =
            match config.scheduler.kind {
                SchedulerKind::Default => {
                    let scheduler = DefaultAgentScheduler::new(pool, intervals)
                        .with_agent_type_filter(filter)
                        .with_max_initial_jitter(config.scheduler.max_initial_jitter());
                    (Arc::new(scheduler) as Arc<dyn AgentScheduler>, None)
                }
                SchedulerKind::Clustered => {
                    let leases = self
                        .lease_store
                        .unwrap_or_else(|| Arc::new(InMemoryLeaseStore::new()));
                    let sharding: Arc<dyn ShardingFilter> = if config.sharding.enabled {
                        let membership = self
                            .membership
                            .unwrap_or_else(|| Arc::new(InMemoryMembershipRegistry::new()));
                        let membership_observer = Arc::new(MembershipObserver::new(
                            node.id(),
                            membership,
                            config.sharding.clone(),
                        ));
                        let members = membership_observer.members();
                        observer = Some(membership_observer);
                        Arc::new(RendezvousShardingFilter::new(
                            node.id(),
                            config.sharding.key,
                            members,
                        ))
                    } else {
                        Arc::new(NoopShardingFilter)
                    };
                    let node_status = self
                        .node_status
                        .unwrap_or_else(|| Arc::new(AlwaysEnabled));

                    let scheduler = Arc::new(
                        ClusteredAgentScheduler::new(
                            node.id(),
                            pool,
                            leases,
                            intervals,
                            config.lease.clone(),
                        )
                        .with_sharding_filter(sharding)
                        .with_node_status(node_status)
                        .with_agent_type_filter(filter)
                        .with_poll_interval(config.scheduler.lock_acquisition_interval())
                        .with_max_concurrent_agents(config.scheduler.max_concurrent_agents),
                    );
                    (
                        Arc::clone(&scheduler) as Arc<dyn AgentScheduler>,
                        Some(scheduler),
                    )
                }
            };

        info!(
            node_id = %node,
            scheduler = ?config.scheduler.kind,
            providers = registry.providers().len(),
            "CATS module assembled"
        );

        Ok(CatsModule {
            config,
            node,
            cache_factory,
            registry,
            scheduler,
            clustered,
            instrumentation,
            metrics,
            observer,
            observer_task: Mutex::new(None),
        })
    }
}

/// A wired caching node: registry, scheduler, instrumentation and background loops.
pub struct CatsModule {
    config: Config,
    node: NodeIdentity,
    cache_factory: Arc<dyn NamedCacheFactory>,
    registry: Arc<ProviderRegistry>,
    scheduler: Arc<dyn AgentScheduler>,
    clustered: Option<Arc<ClusteredAgentScheduler>>,
    instrumentation: Arc<dyn ExecutionInstrumentation>,
    metrics: Arc<MetricsExecutionInstrumentation>,
    observer: Option<Arc<MembershipObserver>>,
    observer_task: Mutex<Option<JoinHandle<()>>>,
}

impl CatsModule {
    /// Start wiring a module.
    pub fn builder() -> CatsModuleBuilder {
        CatsModuleBuilder::default()
    }

    /// Effective configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Identity this node runs under.
    pub fn node(&self) -> &NodeIdentity {
        &self.node
    }

    /// Factory backing every provider cache.
    pub fn cache_factory(&self) -> Arc<dyn NamedCacheFactory> {
        Arc::clone(&self.cache_factory)
    }

    /// Registry of providers and their caches.
    pub fn registry(&self) -> Arc<ProviderRegistry> {
        Arc::clone(&self.registry)
    }

    /// Read view over every provider's cache.
    pub fn cache(&self) -> Arc<CompositeCache> {
        self.registry.cache()
    }

    /// Scheduler picked by `scheduler.kind`.
    pub fn scheduler(&self) -> Arc<dyn AgentScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Per-agent execution counters.
    pub fn metrics(&self) -> Arc<MetricsExecutionInstrumentation> {
        Arc::clone(&self.metrics)
    }

    /// Join the fleet, bind every agent and start the background loops.
    pub async fn start(&self) -> DomainResult<BindReport> {
        if let Some(observer) = &self.observer {
            observer.refresh().await;
            *self.observer_task.lock().await = observer.start();
        }

        let report = AgentController::bind(
            &self.registry,
            Arc::clone(&self.scheduler),
            Arc::clone(&self.instrumentation),
        )
        .await?;

        if let Some(clustered) = &self.clustered {
            clustered.start().await;
        }
        info!(node_id = %self.node, scheduled = report.scheduled, "CATS node started");
        Ok(report)
    }

    /// Stop scheduling, release everything this node owns and leave the fleet.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        if let Some(observer) = &self.observer {
            observer.stop();
            if let Some(task) = self.observer_task.lock().await.take() {
                if let Err(e) = task.await {
                    warn!(node_id = %self.node, error = %e, "Membership observer ended abnormally");
                }
            }
        }
        info!(node_id = %self.node, "CATS node stopped");
    }
}
