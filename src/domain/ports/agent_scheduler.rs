//! Scheduler port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::agent::{Agent, AgentExecution};
use super::instrumentation::ExecutionInstrumentation;
use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentState, ExecutionStatus};

/// Scheduling table row for one agent type on this node.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledAgentStatus {
    pub agent_type: String,
    /// Provider the agent belongs to.
    pub provider: String,
    /// State on this node.
    pub state: AgentState,
    /// Next due time, when known.
    pub next_run: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
    pub last_outcome: Option<ExecutionStatus>,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Executions run on this node.
    pub executions: u64,
}

/// Drives agents on their cadence.
#[async_trait]
pub trait AgentScheduler: Send + Sync {
    /// Register an agent. Scheduling an agent type twice replaces the earlier entry.
    async fn schedule(
        &self,
        agent: Arc<dyn Agent>,
        execution: Arc<dyn AgentExecution>,
        instrumentation: Arc<dyn ExecutionInstrumentation>,
    ) -> DomainResult<()>;

    /// Stop driving an agent and give up any ownership it holds.
    async fn unschedule(&self, agent_type: &str) -> DomainResult<()>;

    /// Whether this scheduler guarantees fleet-wide mutual exclusion per agent type.
    fn is_atomic(&self) -> bool;

    /// Whether this node currently owns the agent type.
    async fn owns(&self, agent_type: &str) -> bool;

    /// Status of every agent this scheduler knows about.
    async fn snapshot(&self) -> Vec<ScheduledAgentStatus>;

    /// Stop all loops and release everything this node owns.
    async fn shutdown(&self);
}

/// Capability for providers and agents that need the scheduler injected.
pub trait AgentSchedulerAware: Send + Sync {
    /// Receive the scheduler the registry was bound to.
    fn set_agent_scheduler(&self, scheduler: Arc<dyn AgentScheduler>);
}
