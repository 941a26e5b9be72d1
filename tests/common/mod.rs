//! Common test utilities for integration tests
//!
//! Scripted caching agents, an overlap tracker shared between nodes, and
//! builders for schedulers wired the way a node wires them.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cats::adapters::memory::InMemoryLeaseStore;
use cats::application::{ClusteredAgentScheduler, DefaultAgentScheduler, WorkerPool, WorkerPoolConfig};
use cats::domain::models::{AgentDataType, AgentInterval, CacheResult, CustomSchedule, LeaseConfig};
use cats::domain::ports::{Agent, AgentExecution, Cache, CachingAgent};
use cats::services::{AgentIntervalProvider, CacheExecution, ProviderRegistry};
use cats::{DomainError, DomainResult};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Counts concurrent loads of one agent type, possibly across nodes.
#[derive(Debug, Default)]
pub struct OverlapTracker {
    running: AtomicUsize,
    peak: AtomicUsize,
    loads: AtomicUsize,
}

impl OverlapTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn enter(self: &Arc<Self>) -> TrackerGuard {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        TrackerGuard(Arc::clone(self))
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

struct TrackerGuard(Arc<OverlapTracker>);

impl Drop for TrackerGuard {
    fn drop(&mut self) {
        self.0.running.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub enum Behavior {
    Produce(CacheResult),
    Fail(&'static str),
    Panic,
}

/// Caching agent with a fixed behavior and load latency.
pub struct ScriptedAgent {
    agent_type: String,
    provider: String,
    data_types: Vec<AgentDataType>,
    behavior: Behavior,
    latency: Duration,
    schedule: Option<CustomSchedule>,
    tracker: Arc<OverlapTracker>,
}

impl ScriptedAgent {
    pub fn new(agent_type: &str, provider: &str, behavior: Behavior) -> Self {
        Self {
            agent_type: agent_type.to_string(),
            provider: provider.to_string(),
            data_types: Vec::new(),
            behavior,
            latency: Duration::ZERO,
            schedule: None,
            tracker: OverlapTracker::new(),
        }
    }

    pub fn with_data_types(mut self, data_types: Vec<AgentDataType>) -> Self {
        self.data_types = data_types;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.schedule = Some(CustomSchedule {
            interval: Some(interval),
            ..CustomSchedule::default()
        });
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<OverlapTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn tracker(&self) -> Arc<OverlapTracker> {
        Arc::clone(&self.tracker)
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Agent for ScriptedAgent {
    fn agent_type(&self) -> &str {
        &self.agent_type
    }

    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn custom_schedule(&self) -> Option<CustomSchedule> {
        self.schedule
    }

    fn agent_execution(
        self: Arc<Self>,
        registry: &ProviderRegistry,
    ) -> DomainResult<Arc<dyn AgentExecution>> {
        CacheExecution::bind(self, registry)
    }
}

#[async_trait]
impl CachingAgent for ScriptedAgent {
    fn provided_data_types(&self) -> Vec<AgentDataType> {
        self.data_types.clone()
    }

    async fn load_data(&self, _cache: &dyn Cache) -> DomainResult<CacheResult> {
        let _guard = self.tracker.enter();
        tokio::time::sleep(self.latency).await;
        match &self.behavior {
            Behavior::Produce(result) => Ok(result.clone()),
            Behavior::Fail(message) => Err(DomainError::provider(&self.agent_type, *message)),
            Behavior::Panic => panic!("scripted agent {} panicked", self.agent_type),
        }
    }
}

pub fn intervals(interval_ms: u64, error_interval_ms: u64, timeout_ms: u64) -> AgentIntervalProvider {
    AgentIntervalProvider::new(AgentInterval::new(
        Duration::from_millis(interval_ms),
        Duration::from_millis(error_interval_ms),
        Duration::from_millis(timeout_ms),
    ))
}

pub fn pool(name: &str, size: usize) -> Arc<WorkerPool> {
    Arc::new(WorkerPool::new(WorkerPoolConfig::new(name, size, 64)))
}

pub fn default_scheduler(intervals: AgentIntervalProvider) -> Arc<DefaultAgentScheduler> {
    Arc::new(DefaultAgentScheduler::new(pool("test", 4), intervals))
}

/// A fleet node: short lease TTL and a fast poll so scenarios fit in a few
/// virtual seconds.
pub fn clustered_node(
    node_id: &str,
    leases: Arc<InMemoryLeaseStore>,
    intervals: AgentIntervalProvider,
) -> ClusteredAgentScheduler {
    ClusteredAgentScheduler::new(
        node_id,
        pool(node_id, 4),
        leases,
        intervals,
        LeaseConfig {
            ttl_ms: 1_000,
            renewal_interval_ms: 200,
        },
    )
    .with_poll_interval(Duration::from_millis(100))
}
