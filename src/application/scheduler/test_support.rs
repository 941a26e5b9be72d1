//! Stub agents and executions for scheduler tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CacheData, CacheResult, CustomSchedule, StoreSummary};
use crate::domain::ports::{Agent, AgentExecution, ExecutionInstrumentation};
use crate::services::provider_registry::ProviderRegistry;

pub(crate) struct StubAgent {
    agent_type: String,
    schedule: Option<CustomSchedule>,
}

impl StubAgent {
    pub(crate) fn new(agent_type: &str) -> Arc<Self> {
        Arc::new(Self {
            agent_type: agent_type.to_string(),
            schedule: None,
        })
    }

    pub(crate) fn every(agent_type: &str, interval: Duration, timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            agent_type: agent_type.to_string(),
            schedule: Some(CustomSchedule {
                interval: Some(interval),
                error_interval: None,
                timeout: Some(timeout),
            }),
        })
    }
}

impl Agent for StubAgent {
    fn agent_type(&self) -> &str {
        &self.agent_type
    }

    fn provider_name(&self) -> &str {
        "stub"
    }

    fn custom_schedule(&self) -> Option<CustomSchedule> {
        self.schedule
    }

    fn agent_execution(
        self: Arc<Self>,
        _registry: &ProviderRegistry,
    ) -> DomainResult<Arc<dyn AgentExecution>> {
        Ok(CountingExecution::new(Duration::ZERO))
    }
}

/// Sleeps for `load_time` on load and counts loads, stores and overlap.
#[derive(Default)]
pub(crate) struct CountingExecution {
    load_time: Duration,
    failure: Option<&'static str>,
    pub(crate) loads: AtomicUsize,
    pub(crate) stores: AtomicUsize,
    running: AtomicUsize,
    pub(crate) peak: AtomicUsize,
}

impl CountingExecution {
    pub(crate) fn new(load_time: Duration) -> Arc<Self> {
        Arc::new(Self {
            load_time,
            ..Self::default()
        })
    }

    pub(crate) fn failing() -> Arc<Self> {
        Arc::new(Self {
            failure: Some("provider unavailable"),
            ..Self::default()
        })
    }

    /// Fails every load with a throttling error.
    pub(crate) fn throttled() -> Arc<Self> {
        Arc::new(Self {
            failure: Some("Rate exceeded"),
            ..Self::default()
        })
    }

    pub(crate) fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub(crate) fn stores(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Loads in flight right now.
    pub(crate) fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }
}

/// Counts a load as running until its future is dropped, aborted or not.
struct Running<'a>(&'a AtomicUsize);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AgentExecution for CountingExecution {
    async fn load(&self) -> DomainResult<Option<CacheResult>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let running = Running(&self.running);
        tokio::time::sleep(self.load_time).await;
        drop(running);
        if let Some(message) = self.failure {
            return Err(DomainError::provider("stub", message));
        }
        Ok(Some(
            CacheResult::new().with_items("things", vec![CacheData::new("thing-1")]),
        ))
    }

    async fn store(&self, _result: CacheResult) -> DomainResult<StoreSummary> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        Ok(StoreSummary::default())
    }
}

/// Counts hook invocations.
#[derive(Default)]
pub(crate) struct CountingInstrumentation {
    pub(crate) started: AtomicUsize,
    pub(crate) completed: AtomicUsize,
    pub(crate) failed: AtomicUsize,
}

impl CountingInstrumentation {
    pub(crate) fn counts(&self) -> (usize, usize, usize) {
        (
            self.started.load(Ordering::SeqCst),
            self.completed.load(Ordering::SeqCst),
            self.failed.load(Ordering::SeqCst),
        )
    }
}

impl ExecutionInstrumentation for CountingInstrumentation {
    fn execution_started(&self, _agent: &dyn Agent) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn execution_completed(&self, _agent: &dyn Agent, _elapsed: Duration) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn execution_failed(&self, _agent: &dyn Agent, _error: &DomainError, _elapsed: Duration) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}
