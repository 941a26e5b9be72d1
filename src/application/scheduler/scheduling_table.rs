//! Per-node scheduling table.
//!
//! One row per scheduled agent type holding its handles, cadence and state.
//! Every state change goes through `transition`, which rejects moves the
//! agent state machine does not allow.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentInterval, AgentState, ExecutionStatus};
use crate::domain::ports::{Agent, AgentExecution, ExecutionInstrumentation, ScheduledAgentStatus};

/// Everything needed to run one agent.
#[derive(Clone)]
pub struct AgentHandles {
    pub agent: Arc<dyn Agent>,
    /// Bound load and store for the agent.
    pub execution: Arc<dyn AgentExecution>,
    /// Hooks reported to around each execution.
    pub instrumentation: Arc<dyn ExecutionInstrumentation>,
    /// Cadence resolved when the agent was scheduled.
    pub interval: AgentInterval,
}

struct Row {
    handles: AgentHandles,
    state: AgentState,
    held_until: Option<Instant>,
    next_run: Option<DateTime<Utc>>,
    last_run: Option<DateTime<Utc>>,
    last_outcome: Option<ExecutionStatus>,
    consecutive_failures: u32,
    executions: u64,
}

/// Per-node state of every scheduled agent type.
#[derive(Default)]
pub struct SchedulingTable {
    rows: RwLock<HashMap<String, Row>>,
}

impl SchedulingTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a row. The new row starts `Unscheduled`.
    pub async fn insert(&self, handles: AgentHandles) -> Option<AgentHandles> {
        let agent_type = handles.agent.agent_type().to_string();
        let row = Row {
            handles,
            state: AgentState::Unscheduled,
            held_until: None,
            next_run: None,
            last_run: None,
            last_outcome: None,
            consecutive_failures: 0,
            executions: 0,
        };
        self.rows
            .write()
            .await
            .insert(agent_type, row)
            .map(|previous| previous.handles)
    }

    /// Drop a row, returning its handles and last state.
    pub async fn remove(&self, agent_type: &str) -> Option<(AgentHandles, AgentState)> {
        self.rows
            .write()
            .await
            .remove(agent_type)
            .map(|row| (row.handles, row.state))
    }

    pub async fn handles(&self, agent_type: &str) -> Option<AgentHandles> {
        self.rows
            .read()
            .await
            .get(agent_type)
            .map(|row| row.handles.clone())
    }

    pub async fn state(&self, agent_type: &str) -> Option<AgentState> {
        self.rows.read().await.get(agent_type).map(|row| row.state)
    }

    /// Failures in a row recorded for an agent, 0 for unknown agents.
    pub async fn consecutive_failures(&self, agent_type: &str) -> u32 {
        self.rows
            .read()
            .await
            .get(agent_type)
            .map_or(0, |row| row.consecutive_failures)
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Agent types currently in `state`.
    pub async fn in_state(&self, state: AgentState) -> Vec<String> {
        self.rows
            .read()
            .await
            .iter()
            .filter(|(_, row)| row.state == state)
            .map(|(agent_type, _)| agent_type.clone())
            .collect()
    }

    /// Owned-idle agent types whose hold has run out.
    pub async fn expired_holds(&self, now: Instant) -> Vec<String> {
        self.rows
            .read()
            .await
            .iter()
            .filter(|(_, row)| {
                row.state == AgentState::OwnedIdle && row.held_until.is_some_and(|until| until <= now)
            })
            .map(|(agent_type, _)| agent_type.clone())
            .collect()
    }

    /// Move a row to `to`, rejecting transitions the state machine does not allow.
    pub async fn transition(&self, agent_type: &str, to: AgentState) -> DomainResult<()> {
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(agent_type)
            .ok_or_else(|| DomainError::AgentNotScheduled(agent_type.to_string()))?;
        apply(agent_type, row, to)
    }

    /// Record the outcome of a run and move the row back to `OwnedIdle`.
    ///
    /// `hold` is how long this node keeps the agent after the run; `None`
    /// means it stays owned until the next local run.
    pub async fn complete(
        &self,
        agent_type: &str,
        status: ExecutionStatus,
        next_delay: Duration,
        hold: Option<Duration>,
    ) -> DomainResult<()> {
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(agent_type)
            .ok_or_else(|| DomainError::AgentNotScheduled(agent_type.to_string()))?;
        apply(agent_type, row, AgentState::OwnedIdle)?;
        record(row, status, next_delay);
        row.held_until = hold.map(|hold| Instant::now() + hold);
        Ok(())
    }

    /// Record the outcome of a run whose ownership was lost, leaving the row
    /// `Unscheduled`.
    pub async fn abandon(
        &self,
        agent_type: &str,
        status: ExecutionStatus,
        next_delay: Duration,
    ) -> DomainResult<()> {
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(agent_type)
            .ok_or_else(|| DomainError::AgentNotScheduled(agent_type.to_string()))?;
        apply(agent_type, row, AgentState::Released)?;
        apply(agent_type, row, AgentState::Unscheduled)?;
        record(row, status, next_delay);
        Ok(())
    }

    /// Release an owned row back to `Unscheduled`. No-op for rows that are not owned.
    pub async fn release(&self, agent_type: &str) -> DomainResult<bool> {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.get_mut(agent_type) else {
            return Ok(false);
        };
        if !row.state.is_owned() {
            return Ok(false);
        }
        apply(agent_type, row, AgentState::Released)?;
        apply(agent_type, row, AgentState::Unscheduled)?;
        Ok(true)
    }

    /// Status of every row, sorted by agent type.
    pub async fn snapshot(&self) -> Vec<ScheduledAgentStatus> {
        let rows = self.rows.read().await;
        let mut statuses: Vec<ScheduledAgentStatus> = rows
            .iter()
            .map(|(agent_type, row)| ScheduledAgentStatus {
                agent_type: agent_type.clone(),
                provider: row.handles.agent.provider_name().to_string(),
                state: row.state,
                next_run: row.next_run,
                last_run: row.last_run,
                last_outcome: row.last_outcome,
                consecutive_failures: row.consecutive_failures,
                executions: row.executions,
            })
            .collect();
        statuses.sort_by(|a, b| a.agent_type.cmp(&b.agent_type));
        statuses
    }
}

fn apply(agent_type: &str, row: &mut Row, to: AgentState) -> DomainResult<()> {
    if !row.state.can_transition_to(to) {
        return Err(DomainError::InvalidStateTransition {
            agent_type: agent_type.to_string(),
            from: row.state,
            to,
        });
    }
    row.state = to;
    if !to.is_owned() {
        row.held_until = None;
    }
    Ok(())
}

fn record(row: &mut Row, status: ExecutionStatus, next_delay: Duration) {
    let now = Utc::now();
    row.executions += 1;
    row.last_run = Some(now);
    row.last_outcome = Some(status);
    row.next_run = chrono::Duration::from_std(next_delay)
        .ok()
        .map(|delay| now + delay);
    match status {
        ExecutionStatus::Success => row.consecutive_failures = 0,
        ExecutionStatus::Failure => row.consecutive_failures += 1,
    }
}
