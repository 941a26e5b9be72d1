//! Single-node scheduler.
//!
//! Every scheduled agent gets its own fixed-delay loop: a jittered initial
//! delay, then execute, then wait `interval` after success or the error
//! backoff after failure. Executions run on the shared worker pool.
//! Unscheduling an agent aborts its in-flight execution and waits for it to
//! end; shutdown lets in-flight executions finish.

use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::instrumented::duration_ms;
use super::scheduling_table::{AgentHandles, SchedulingTable};
use super::{execute_on_pool, next_delay, AgentTypeFilter, StartedAt};
use crate::application::worker_pool::WorkerPool;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::AgentState;
use crate::domain::ports::{
    Agent, AgentExecution, AgentScheduler, ExecutionInstrumentation, ScheduledAgentStatus,
};
use crate::services::interval_provider::AgentIntervalProvider;

struct AgentLoop {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl AgentLoop {
    /// Abort the in-flight execution, if any, and wait for the loop to end.
    async fn cancel(self, agent_type: &str) {
        self.cancel.send_replace(true);
        if let Err(e) = self.handle.await {
            warn!(agent_type, error = %e, "Agent loop ended abnormally");
        }
    }
}

/// Runs every scheduled agent on this node.
pub struct DefaultAgentScheduler {
    table: Arc<SchedulingTable>,
    pool: Arc<WorkerPool>,
    intervals: AgentIntervalProvider,
    filter: AgentTypeFilter,
    max_initial_jitter: Duration,
    loops: Mutex<HashMap<String, AgentLoop>>,
    stop_tx: watch::Sender<bool>,
}

impl DefaultAgentScheduler {
    /// Scheduler with no type filter and no initial jitter.
    pub fn new(pool: Arc<WorkerPool>, intervals: AgentIntervalProvider) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            table: Arc::new(SchedulingTable::new()),
            pool,
            intervals,
            filter: AgentTypeFilter::allow_all(),
            max_initial_jitter: Duration::ZERO,
            loops: Mutex::new(HashMap::new()),
            stop_tx,
        }
    }

    /// Only schedule agent types the filter allows.
    pub fn with_agent_type_filter(mut self, filter: AgentTypeFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Spread first runs over up to this long, capped at each agent's interval.
    pub fn with_max_initial_jitter(mut self, max_initial_jitter: Duration) -> Self {
        self.max_initial_jitter = max_initial_jitter;
        self
    }

    fn initial_delay(&self, interval: Duration) -> Duration {
        let bound = duration_ms(interval.min(self.max_initial_jitter));
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..bound))
    }
}

struct LoopContext {
    table: Arc<SchedulingTable>,
    pool: Arc<WorkerPool>,
    intervals: AgentIntervalProvider,
    agent_type: String,
}

async fn agent_loop(
    ctx: LoopContext,
    initial_delay: Duration,
    mut stop_rx: watch::Receiver<bool>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let LoopContext {
        table,
        pool,
        intervals,
        agent_type,
    } = ctx;
    let mut delay = initial_delay;
    loop {
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = stop_rx.changed() => break,
            _ = cancel_rx.changed() => break,
        }

        let Some(handles) = table.handles(&agent_type).await else {
            break;
        };
        if let Err(e) = table.transition(&agent_type, AgentState::OwnedRunning).await {
            warn!(agent_type = %agent_type, error = %e, "Agent not runnable, stopping its loop");
            break;
        }

        let interval = handles.interval;
        let outcome = execute_on_pool(
            &pool,
            handles,
            || async { true },
            StartedAt::default(),
            cancel_rx.clone(),
        )
        .await;
        if *cancel_rx.borrow() {
            break;
        }

        delay = next_delay(&table, &intervals, &agent_type, &interval, &outcome).await;
        if let Err(e) = table.complete(&agent_type, outcome.status(), delay, None).await {
            debug!(agent_type = %agent_type, error = %e, "Agent left the table during execution");
            break;
        }
    }
}

#[async_trait]
impl AgentScheduler for DefaultAgentScheduler {
    async fn schedule(
        &self,
        agent: Arc<dyn Agent>,
        execution: Arc<dyn AgentExecution>,
        instrumentation: Arc<dyn ExecutionInstrumentation>,
    ) -> DomainResult<()> {
        let agent_type = agent.agent_type().to_string();
        if !self.filter.allows(&agent_type) {
            info!(agent_type = %agent_type, "Agent type disabled by pattern, not scheduling");
            return Ok(());
        }
        if *self.stop_tx.borrow() {
            return Err(DomainError::PoolClosed(self.pool.name().to_string()));
        }

        let interval = self.intervals.interval_for(agent.as_ref());
        let mut loops = self.loops.lock().await;
        if let Some(previous) = loops.remove(&agent_type) {
            warn!(agent_type = %agent_type, "Agent type scheduled twice, replacing earlier agent");
            previous.cancel(&agent_type).await;
        }

        self.table
            .insert(AgentHandles {
                agent,
                execution,
                instrumentation,
                interval,
            })
            .await;
        self.table
            .transition(&agent_type, AgentState::OwnedIdle)
            .await?;

        let initial_delay = self.initial_delay(interval.interval);
        debug!(
            agent_type = %agent_type,
            initial_delay_ms = duration_ms(initial_delay),
            interval_ms = duration_ms(interval.interval),
            "Agent scheduled"
        );
        let (cancel, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(agent_loop(
            LoopContext {
                table: Arc::clone(&self.table),
                pool: Arc::clone(&self.pool),
                intervals: self.intervals,
                agent_type: agent_type.clone(),
            },
            initial_delay,
            self.stop_tx.subscribe(),
            cancel_rx,
        ));
        loops.insert(agent_type, AgentLoop { cancel, handle });
        Ok(())
    }

    async fn unschedule(&self, agent_type: &str) -> DomainResult<()> {
        let agent_loop = self.loops.lock().await.remove(agent_type);
        let Some(agent_loop) = agent_loop else {
            return Err(DomainError::AgentNotScheduled(agent_type.to_string()));
        };
        let removed = self.table.remove(agent_type).await;
        agent_loop.cancel(agent_type).await;
        if let Some((_, state)) = removed {
            debug!(agent_type, from = %state, "Agent unscheduled");
        }
        Ok(())
    }

    fn is_atomic(&self) -> bool {
        false
    }

    async fn owns(&self, agent_type: &str) -> bool {
        self.table
            .state(agent_type)
            .await
            .is_some_and(|state| state.is_owned())
    }

    async fn snapshot(&self) -> Vec<ScheduledAgentStatus> {
        self.table.snapshot().await
    }

    async fn shutdown(&self) {
        self.stop_tx.send_replace(true);
        let loops: Vec<(String, AgentLoop)> = self.loops.lock().await.drain().collect();
        for (agent_type, agent_loop) in loops {
            if let Err(e) = agent_loop.handle.await {
                warn!(agent_type = %agent_type, error = %e, "Agent loop ended abnormally");
            }
            if let Err(e) = self.table.release(&agent_type).await {
                debug!(agent_type = %agent_type, error = %e, "Agent not released cleanly");
            }
        }
        self.pool.shutdown().await;
        info!("Default agent scheduler stopped");
    }
}
