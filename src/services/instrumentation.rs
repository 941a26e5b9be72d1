//! Execution instrumentation implementations.
//!
//! - `LoggingExecutionInstrumentation`: structured tracing events
//! - `MetricsExecutionInstrumentation`: in-process per-agent counters
//! - `CompositeExecutionInstrumentation`: fans out to several delegates and
//!   contains panics raised by any of them

use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::errors::DomainError;
use crate::domain::ports::{Agent, ExecutionInstrumentation};

/// Emits one tracing event per lifecycle hook.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingExecutionInstrumentation;

impl ExecutionInstrumentation for LoggingExecutionInstrumentation {
    fn execution_started(&self, agent: &dyn Agent) {
        debug!(
            agent_type = agent.agent_type(),
            provider = agent.provider_name(),
            "Agent execution started"
        );
    }

    fn execution_completed(&self, agent: &dyn Agent, elapsed: Duration) {
        info!(
            agent_type = agent.agent_type(),
            provider = agent.provider_name(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Agent execution completed"
        );
    }

    fn execution_failed(&self, agent: &dyn Agent, error: &DomainError, elapsed: Duration) {
        warn!(
            agent_type = agent.agent_type(),
            provider = agent.provider_name(),
            elapsed_ms = elapsed.as_millis() as u64,
            error_kind = error.kind(),
            error = %error,
            "Agent execution failed"
        );
    }
}

/// Counters for one agent type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgentMetrics {
    /// Executions started.
    pub started: u64,
    /// Executions stored.
    pub successes: u64,
    /// Executions failed.
    pub failures: u64,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Duration of the last finished execution.
    pub last_duration_ms: Option<u64>,
    /// Failures keyed by `DomainError::kind`.
    pub failures_by_kind: BTreeMap<String, u64>,
}

/// Keeps per-agent execution counters in memory.
#[derive(Debug, Default)]
pub struct MetricsExecutionInstrumentation {
    agents: DashMap<String, AgentMetrics>,
}

impl MetricsExecutionInstrumentation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters of one agent type.
    pub fn agent(&self, agent_type: &str) -> Option<AgentMetrics> {
        self.agents.get(agent_type).map(|m| m.value().clone())
    }

    /// Counters of every agent seen so far.
    pub fn snapshot(&self) -> BTreeMap<String, AgentMetrics> {
        self.agents
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Failures across all agents.
    pub fn total_failures(&self) -> u64 {
        self.agents.iter().map(|entry| entry.value().failures).sum()
    }
}

impl ExecutionInstrumentation for MetricsExecutionInstrumentation {
    fn execution_started(&self, agent: &dyn Agent) {
        self.agents
            .entry(agent.agent_type().to_string())
            .or_default()
            .started += 1;
    }

    fn execution_completed(&self, agent: &dyn Agent, elapsed: Duration) {
        let mut metrics = self.agents.entry(agent.agent_type().to_string()).or_default();
        metrics.successes += 1;
        metrics.consecutive_failures = 0;
        metrics.last_duration_ms = Some(elapsed.as_millis() as u64);
    }

    fn execution_failed(&self, agent: &dyn Agent, error: &DomainError, elapsed: Duration) {
        let mut metrics = self.agents.entry(agent.agent_type().to_string()).or_default();
        metrics.failures += 1;
        metrics.consecutive_failures += 1;
        metrics.last_duration_ms = Some(elapsed.as_millis() as u64);
        *metrics
            .failures_by_kind
            .entry(error.kind().to_string())
            .or_default() += 1;
    }
}

/// Forwards every hook to each delegate in order.
///
/// A delegate that panics is logged and skipped; the remaining delegates and
/// the observed execution carry on.
#[derive(Default, Clone)]
pub struct CompositeExecutionInstrumentation {
    delegates: Vec<Arc<dyn ExecutionInstrumentation>>,
}

impl CompositeExecutionInstrumentation {
    /// Fan out to `delegates` in order.
    pub fn new(delegates: Vec<Arc<dyn ExecutionInstrumentation>>) -> Self {
        Self { delegates }
    }

    /// Add a delegate.
    pub fn with(mut self, delegate: Arc<dyn ExecutionInstrumentation>) -> Self {
        self.delegates.push(delegate);
        self
    }

    fn each(&self, agent: &dyn Agent, hook: &str, call: impl Fn(&dyn ExecutionInstrumentation)) {
        for delegate in &self.delegates {
            if catch_unwind(AssertUnwindSafe(|| call(delegate.as_ref()))).is_err() {
                warn!(
                    agent_type = agent.agent_type(),
                    hook,
                    "Execution instrumentation panicked, ignoring"
                );
            }
        }
    }
}

impl ExecutionInstrumentation for CompositeExecutionInstrumentation {
    fn execution_started(&self, agent: &dyn Agent) {
        self.each(agent, "execution_started", |d| d.execution_started(agent));
    }

    fn execution_completed(&self, agent: &dyn Agent, elapsed: Duration) {
        self.each(agent, "execution_completed", |d| {
            d.execution_completed(agent, elapsed);
        });
    }

    fn execution_failed(&self, agent: &dyn Agent, error: &DomainError, elapsed: Duration) {
        self.each(agent, "execution_failed", |d| {
            d.execution_failed(agent, error, elapsed);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainResult;
    use crate::domain::ports::AgentExecution;
    use crate::services::provider_registry::ProviderRegistry;

    struct NamedAgent(&'static str);

    impl Agent for NamedAgent {
        fn agent_type(&self) -> &str {
            self.0
        }

        fn provider_name(&self) -> &str {
            "test"
        }

        fn agent_execution(
            self: Arc<Self>,
            _registry: &ProviderRegistry,
        ) -> DomainResult<Arc<dyn AgentExecution>> {
            Err(DomainError::UnknownProvider("test".into()))
        }
    }

    struct PanickingInstrumentation;

    impl ExecutionInstrumentation for PanickingInstrumentation {
        fn execution_started(&self, _agent: &dyn Agent) {
            panic!("metrics backend unavailable");
        }

        fn execution_completed(&self, _agent: &dyn Agent, _elapsed: Duration) {
            panic!("metrics backend unavailable");
        }

        fn execution_failed(&self, _agent: &dyn Agent, _error: &DomainError, _elapsed: Duration) {
            panic!("metrics backend unavailable");
        }
    }

    #[test]
    fn test_metrics_track_consecutive_failures() {
        let metrics = MetricsExecutionInstrumentation::new();
        let agent = NamedAgent("aws/us-east-1/Instances");
        let error = DomainError::provider(agent.0, "throttled");

        metrics.execution_failed(&agent, &error, Duration::from_millis(5));
        metrics.execution_failed(&agent, &error, Duration::from_millis(5));
        let failing = metrics.agent(agent.0).unwrap();
        assert_eq!(failing.failures, 2);
        assert_eq!(failing.consecutive_failures, 2);
        assert_eq!(failing.failures_by_kind.get("provider"), Some(&2));

        metrics.execution_completed(&agent, Duration::from_millis(12));
        let recovered = metrics.agent(agent.0).unwrap();
        assert_eq!(recovered.successes, 1);
        assert_eq!(recovered.consecutive_failures, 0);
        assert_eq!(recovered.last_duration_ms, Some(12));
    }

    #[test]
    fn test_composite_contains_panicking_delegate() {
        let metrics = Arc::new(MetricsExecutionInstrumentation::new());
        let composite = CompositeExecutionInstrumentation::default()
            .with(Arc::new(PanickingInstrumentation))
            .with(metrics.clone());
        let agent = NamedAgent("aws/us-east-1/Instances");

        composite.execution_started(&agent);
        composite.execution_completed(&agent, Duration::from_millis(1));
        composite.execution_failed(&agent, &DomainError::Storage("down".into()), Duration::ZERO);

        let counted = metrics.agent(agent.0).unwrap();
        assert_eq!(counted.started, 1);
        assert_eq!(counted.successes, 1);
        assert_eq!(counted.failures, 1);
    }
}
