//! One instrumented, time-bounded agent execution.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error};

use super::scheduling_table::AgentHandles;
use crate::domain::errors::DomainError;
use crate::domain::models::{ExecutionStatus, FailureClass, StoreSummary};

/// How an execution ended.
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// Loaded and stored.
    Stored(StoreSummary),
    /// The result was loaded but not stored because ownership was lost.
    Discarded,
    /// Load or store failed, timed out or was cancelled.
    Failed(DomainError),
}

impl ExecutionOutcome {
    /// Success only when the result was stored.
    pub fn status(&self) -> ExecutionStatus {
        match self {
            Self::Stored(_) => ExecutionStatus::Success,
            Self::Discarded | Self::Failed(_) => ExecutionStatus::Failure,
        }
    }

    /// Backoff class of a failed execution, `None` after success.
    pub fn failure_class(&self) -> Option<FailureClass> {
        match self {
            Self::Stored(_) => None,
            Self::Discarded => Some(FailureClass::Transient),
            Self::Failed(error) => Some(error.failure_class()),
        }
    }

    /// The execution was stopped by its scheduler before it ended.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Failed(DomainError::Cancelled(_)))
    }
}

/// Invoke an instrumentation hook, containing any panic it raises.
pub(crate) fn notify(agent_type: &str, hook: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(hook)).is_err() {
        error!(agent_type, "Execution instrumentation panicked, ignoring");
    }
}

/// Load, check `may_store`, then store, all bounded by the agent timeout.
///
/// Instrumentation sees `started` first, then exactly one of `completed` or
/// `failed`. A timeout is reported as a failure like any other error.
pub async fn run_execution<F, Fut>(handles: AgentHandles, may_store: F) -> ExecutionOutcome
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = bool> + Send,
{
    let AgentHandles {
        agent,
        execution,
        instrumentation,
        interval,
    } = handles;
    let agent_type = agent.agent_type().to_string();

    notify(&agent_type, || instrumentation.execution_started(agent.as_ref()));
    let started = Instant::now();

    let work = async {
        let Some(result) = execution.load().await? else {
            return Ok::<_, DomainError>(Some(StoreSummary::default()));
        };
        if !may_store().await {
            return Ok(None);
        }
        execution.store(result).await.map(Some)
    };

    let outcome = match tokio::time::timeout(interval.timeout, work).await {
        Ok(Ok(Some(summary))) => ExecutionOutcome::Stored(summary),
        Ok(Ok(None)) => ExecutionOutcome::Discarded,
        Ok(Err(e)) => ExecutionOutcome::Failed(e),
        Err(_) => ExecutionOutcome::Failed(DomainError::ExecutionTimeout {
            agent_type: agent_type.clone(),
            timeout_ms: duration_ms(interval.timeout),
        }),
    };

    let elapsed = started.elapsed();
    match &outcome {
        ExecutionOutcome::Stored(summary) => {
            debug!(
                agent_type = %agent_type,
                merged = summary.merged(),
                evicted = summary.evicted(),
                elapsed_ms = duration_ms(elapsed),
                "Execution stored"
            );
            notify(&agent_type, || {
                instrumentation.execution_completed(agent.as_ref(), elapsed);
            });
        }
        ExecutionOutcome::Discarded => {
            let error = DomainError::Lease(format!(
                "lease on {agent_type} lost before store, result discarded"
            ));
            notify(&agent_type, || {
                instrumentation.execution_failed(agent.as_ref(), &error, elapsed);
            });
        }
        ExecutionOutcome::Failed(error) => {
            notify(&agent_type, || {
                instrumentation.execution_failed(agent.as_ref(), error, elapsed);
            });
        }
    }
    outcome
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
