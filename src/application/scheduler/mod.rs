//! Agent schedulers.
//!
//! `DefaultAgentScheduler` runs every agent on this node. The
//! `ClusteredAgentScheduler` runs an agent only while it holds the agent's
//! lease, so at most one node in the fleet executes a given agent type at a time.

pub mod clustered_scheduler;
pub mod default_scheduler;
pub mod instrumented;
pub mod scheduling_table;
#[cfg(test)]
pub(crate) mod test_support;

pub use clustered_scheduler::ClusteredAgentScheduler;
pub use default_scheduler::DefaultAgentScheduler;
pub use instrumented::{run_execution, ExecutionOutcome};
pub use scheduling_table::{AgentHandles, SchedulingTable};

use futures::future::{self, Either};
use regex::Regex;
use std::future::Future;
use std::pin::pin;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use super::worker_pool::WorkerPool;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentInterval, SchedulerConfig};
use crate::services::interval_provider::AgentIntervalProvider;
use instrumented::notify;

/// Gates which agent types a scheduler accepts.
///
/// Patterns are full-match regexes applied to the lower-cased agent type.
#[derive(Debug, Clone, Default)]
pub struct AgentTypeFilter {
    enabled: Option<Regex>,
    disabled: Option<Regex>,
}

impl AgentTypeFilter {
    pub fn new(enabled: &str, disabled: Option<&str>) -> DomainResult<Self> {
        Ok(Self {
            enabled: Some(full_match(enabled)?),
            disabled: disabled.map(full_match).transpose()?,
        })
    }

    /// Accepts every agent type.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SchedulerConfig) -> DomainResult<Self> {
        Self::new(&config.enabled_pattern, config.disabled_pattern.as_deref())
    }

    pub fn allows(&self, agent_type: &str) -> bool {
        let agent_type = agent_type.to_lowercase();
        self.enabled
            .as_ref()
            .map_or(true, |enabled| enabled.is_match(&agent_type))
            && !self
                .disabled
                .as_ref()
                .is_some_and(|disabled| disabled.is_match(&agent_type))
    }
}

fn full_match(pattern: &str) -> DomainResult<Regex> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| DomainError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// When a worker picked an execution up. Unset while it waits in the queue.
pub(crate) type StartedAt = Arc<OnceLock<Instant>>;

/// Run an execution on the pool until it ends or `cancel` turns true.
///
/// A cancelled execution is aborted and this returns only after its future
/// has been dropped, so the caller may hand the agent to someone else. Pool
/// failures (a panicking agent, an aborted job) of an execution that had
/// started are reported to instrumentation like any other failure.
pub(crate) async fn execute_on_pool<F, Fut>(
    pool: &WorkerPool,
    handles: AgentHandles,
    may_store: F,
    started_at: StartedAt,
    cancel: watch::Receiver<bool>,
) -> ExecutionOutcome
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    let agent = handles.agent.clone();
    let instrumentation = handles.instrumentation.clone();
    let job = {
        let started_at = Arc::clone(&started_at);
        async move {
            let _ = started_at.set(Instant::now());
            run_execution(handles, may_store).await
        }
    };

    let result = match pool.spawn(job).await {
        Ok(mut task) => match future::select(&mut task, pin!(cancellation(cancel))).await {
            Either::Left((result, _)) => result,
            Either::Right(((), task)) => {
                task.abort();
                task.await
            }
        },
        Err(error) => Err(error),
    };

    match result {
        Ok(outcome) => outcome,
        Err(error) => {
            match started_at.get() {
                Some(started) => {
                    let elapsed = started.elapsed();
                    notify(agent.agent_type(), || {
                        instrumentation.execution_failed(agent.as_ref(), &error, elapsed);
                    });
                }
                None => debug!(agent_type = %agent.agent_type(), error = %error, "Execution never started"),
            }
            ExecutionOutcome::Failed(error)
        }
    }
}

/// Delay before the next run after `outcome`, backing off on failure streaks.
pub(crate) async fn next_delay(
    table: &SchedulingTable,
    intervals: &AgentIntervalProvider,
    agent_type: &str,
    interval: &AgentInterval,
    outcome: &ExecutionOutcome,
) -> Duration {
    let failure = outcome.failure_class();
    let streak = match failure {
        Some(_) => table.consecutive_failures(agent_type).await.saturating_add(1),
        None => 0,
    };
    intervals.next_delay(interval, failure, streak)
}

/// Resolves once `cancel` is set. Never resolves if the sender is gone.
async fn cancellation(mut cancel: watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_allows_everything() {
        assert!(AgentTypeFilter::allow_all().allows("aws/us-east-1/Instances"));
        assert!(AgentTypeFilter::new(".*", None).unwrap().allows("aws/us-east-1/Instances"));
    }

    #[test]
    fn test_patterns_match_lower_cased_agent_type() {
        let filter = AgentTypeFilter::new("aws/.*", Some(".*/loadbalancers")).unwrap();
        assert!(filter.allows("AWS/us-east-1/Instances"));
        assert!(!filter.allows("aws/us-east-1/LoadBalancers"));
        assert!(!filter.allows("gce/us-central1/Instances"));
    }

    #[test]
    fn test_pattern_must_match_whole_agent_type() {
        let filter = AgentTypeFilter::new("aws", None).unwrap();
        assert!(!filter.allows("aws/us-east-1/Instances"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        assert!(matches!(
            AgentTypeFilter::new("(", None),
            Err(DomainError::InvalidPattern { .. })
        ));
    }
}
