//! Lease-based cluster scheduler.
//!
//! A single polling loop runs every `lock_acquisition_interval`:
//!
//! 1. skip entirely while the node is disabled
//! 2. prune executions running longer than their timeout plus a grace period
//! 3. return agents whose post-run hold has expired to `Unscheduled`
//! 4. shuffle the unscheduled agents, keep those the sharding filter assigns
//!    to this node, and try to lease them, bounded by `max_concurrent_agents`
//!
//! Every leased agent runs under a supervisor task that renews the lease
//! while the execution is in flight, checks ownership again between load and
//! store, and afterwards keeps the lease until the agent's next due time so
//! no other node runs it early.
//!
//! Pruning, unscheduling and shutdown cancel an execution rather than
//! abandon it: the lease is released only once the execution's future has
//! been dropped, so a node never hands an agent over while still running it.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::instrumented::{duration_ms, ExecutionOutcome};
use super::scheduling_table::{AgentHandles, SchedulingTable};
use super::{execute_on_pool, next_delay, AgentTypeFilter, StartedAt};
use crate::application::worker_pool::WorkerPool;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentState, LeaseConfig};
use crate::domain::ports::{
    Agent, AgentExecution, AgentScheduler, ExecutionInstrumentation, LeaseStore,
    NodeStatusProvider, ScheduledAgentStatus, ShardingFilter,
};
use crate::services::interval_provider::AgentIntervalProvider;
use crate::services::node_identity::AlwaysEnabled;
use crate::services::sharding::NoopShardingFilter;

/// Leases shorter than this are dropped instead of held.
pub const MIN_TTL_THRESHOLD: Duration = Duration::from_millis(500);

struct ActiveExecution {
    id: u64,
    /// Set when a worker picks the execution up.
    started_at: StartedAt,
    timeout: Duration,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ActiveExecution {
    /// Time spent running past the timeout grace, measured from the start of
    /// execution. Queued executions never overrun.
    fn overrun(&self, now: Instant) -> Option<Duration> {
        let started = *self.started_at.get()?;
        let deadline = started + self.timeout + MIN_TTL_THRESHOLD;
        (deadline < now).then(|| now - started)
    }

    /// Cancel the execution and wait for its supervisor to release it.
    async fn cancel(self, agent_type: &str) {
        self.cancel.send_replace(true);
        if let Err(e) = self.task.await {
            warn!(agent_type, error = %e, "Execution supervisor ended abnormally");
        }
    }
}

/// Keeps a lease alive while an execution runs. Dropping it stops renewal
/// and marks the lease lost, so an orphaned execution never stores.
struct LeaseRenewal {
    task: JoinHandle<()>,
    lost: Arc<AtomicBool>,
}

impl LeaseRenewal {
    fn spawn(leases: Arc<dyn LeaseStore>, agent_type: String, node_id: String, lease: LeaseConfig) -> Self {
        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(lease.renewal_interval()).await;
                match leases.renew(&agent_type, &node_id, lease.ttl()).await {
                    Ok(true) => trace!(agent_type = %agent_type, "Lease renewed"),
                    Ok(false) => {
                        warn!(agent_type = %agent_type, node_id = %node_id, "Lease lost during execution");
                        flag.store(true, Ordering::Release);
                        break;
                    }
                    Err(e) => {
                        warn!(agent_type = %agent_type, error = %e, "Lease renewal failed, treating lease as lost");
                        flag.store(true, Ordering::Release);
                        break;
                    }
                }
            }
        });
        Self { task, lost }
    }

    fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.lost)
    }

    fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }
}

impl Drop for LeaseRenewal {
    fn drop(&mut self) {
        self.task.abort();
        self.lost.store(true, Ordering::Release);
    }
}

/// Runs an agent only while this node holds its lease.
pub struct ClusteredAgentScheduler {
    node_id: String,
    table: Arc<SchedulingTable>,
    pool: Arc<WorkerPool>,
    leases: Arc<dyn LeaseStore>,
    sharding: Arc<dyn ShardingFilter>,
    node_status: Arc<dyn NodeStatusProvider>,
    intervals: AgentIntervalProvider,
    filter: AgentTypeFilter,
    lease: LeaseConfig,
    poll_interval: Duration,
    max_concurrent_agents: usize,
    active: Mutex<HashMap<String, ActiveExecution>>,
    next_execution_id: AtomicU64,
    stop_tx: watch::Sender<bool>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl ClusteredAgentScheduler {
    /// Scheduler for `node_id` with no sharding, always enabled, polling every second.
    pub fn new(
        node_id: impl Into<String>,
        pool: Arc<WorkerPool>,
        leases: Arc<dyn LeaseStore>,
        intervals: AgentIntervalProvider,
        lease: LeaseConfig,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            node_id: node_id.into(),
            table: Arc::new(SchedulingTable::new()),
            pool,
            leases,
            sharding: Arc::new(NoopShardingFilter),
            node_status: Arc::new(AlwaysEnabled),
            intervals,
            filter: AgentTypeFilter::allow_all(),
            lease,
            poll_interval: Duration::from_secs(1),
            max_concurrent_agents: usize::MAX,
            active: Mutex::new(HashMap::new()),
            next_execution_id: AtomicU64::new(0),
            stop_tx,
            poller: Mutex::new(None),
        }
    }

    /// Only lease agents this filter assigns to this node.
    pub fn with_sharding_filter(mut self, sharding: Arc<dyn ShardingFilter>) -> Self {
        self.sharding = sharding;
        self
    }

    /// Skip polling while `node_status` reports the node disabled.
    pub fn with_node_status(mut self, node_status: Arc<dyn NodeStatusProvider>) -> Self {
        self.node_status = node_status;
        self
    }

    /// Only schedule agent types the filter allows.
    pub fn with_agent_type_filter(mut self, filter: AgentTypeFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Delay between two passes of the polling loop.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Cap on executions this node supervises at once, cancelled ones included.
    pub fn with_max_concurrent_agents(mut self, max_concurrent_agents: usize) -> Self {
        self.max_concurrent_agents = max_concurrent_agents;
        self
    }

    /// Identity this node leases agents under.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Number of executions this node currently supervises.
    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }

    /// Start the polling loop. A second call is a no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut poller = self.poller.lock().await;
        if poller.is_some() {
            return;
        }
        let scheduler = Arc::clone(self);
        let mut stop_rx = self.stop_tx.subscribe();
        *poller = Some(tokio::spawn(async move {
            info!(node_id = %scheduler.node_id, "Clustered agent scheduler started");
            loop {
                scheduler.poll_once().await;
                tokio::select! {
                    () = tokio::time::sleep(scheduler.poll_interval) => {}
                    _ = stop_rx.changed() => break,
                }
            }
        }));
    }

    /// One pass of the polling loop.
    pub async fn poll_once(self: &Arc<Self>) {
        if *self.stop_tx.borrow() {
            return;
        }
        if !self.node_status.is_node_enabled() {
            trace!(node_id = %self.node_id, "Node disabled, skipping lease acquisition");
            return;
        }
        self.prune_active().await;
        self.expire_holds().await;
        self.acquire().await;
    }

    /// Cancel executions that overran their timeout. Their supervisors keep
    /// the lease until the execution has stopped, then release it.
    async fn prune_active(&self) {
        let now = Instant::now();
        let active = self.active.lock().await;
        for (agent_type, execution) in active.iter() {
            if *execution.cancel.borrow() {
                continue;
            }
            if let Some(running) = execution.overrun(now) {
                warn!(
                    agent_type = %agent_type,
                    running_ms = duration_ms(running),
                    "Execution overran its timeout, cancelling it"
                );
                execution.cancel.send_replace(true);
            }
        }
    }

    async fn expire_holds(&self) {
        for agent_type in self.table.expired_holds(Instant::now()).await {
            match self.table.release(&agent_type).await {
                Ok(_) => trace!(agent_type = %agent_type, "Hold expired, agent eligible again"),
                Err(e) => debug!(agent_type = %agent_type, error = %e, "Could not release held agent"),
            }
        }
    }

    async fn acquire(self: &Arc<Self>) {
        let mut active = self.active.lock().await;
        let mut budget = self.max_concurrent_agents.saturating_sub(active.len());
        if budget == 0 {
            return;
        }

        let mut candidates = self.table.in_state(AgentState::Unscheduled).await;
        candidates.shuffle(&mut rand::thread_rng());

        for agent_type in candidates {
            if budget == 0 {
                break;
            }
            if active.contains_key(&agent_type) {
                continue;
            }
            let Some(handles) = self.table.handles(&agent_type).await else {
                continue;
            };
            if !self.sharding.filter(handles.agent.as_ref()).await {
                continue;
            }

            match self
                .leases
                .try_acquire(&agent_type, &self.node_id, handles.interval.timeout)
                .await
            {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(agent_type = %agent_type, error = %e, "Lease acquisition failed");
                    continue;
                }
            }

            if let Err(e) = self.table.transition(&agent_type, AgentState::OwnedIdle).await {
                warn!(agent_type = %agent_type, error = %e, "Leased agent left the table");
                self.release_lease(&agent_type).await;
                continue;
            }

            let id = self.next_execution_id.fetch_add(1, Ordering::Relaxed);
            let timeout = handles.interval.timeout;
            let started_at = StartedAt::default();
            let (cancel, cancel_rx) = watch::channel(false);
            let task = tokio::spawn(Arc::clone(self).supervise(
                agent_type.clone(),
                handles,
                id,
                Arc::clone(&started_at),
                cancel_rx,
            ));
            debug!(agent_type = %agent_type, node_id = %self.node_id, "Lease acquired");
            active.insert(
                agent_type,
                ActiveExecution {
                    id,
                    started_at,
                    timeout,
                    cancel,
                    task,
                },
            );
            budget -= 1;
        }
    }

    async fn supervise(
        self: Arc<Self>,
        agent_type: String,
        handles: AgentHandles,
        id: u64,
        started_at: StartedAt,
        cancel: watch::Receiver<bool>,
    ) {
        let renewal = LeaseRenewal::spawn(
            Arc::clone(&self.leases),
            agent_type.clone(),
            self.node_id.clone(),
            self.lease.clone(),
        );

        if let Err(e) = self.table.transition(&agent_type, AgentState::OwnedRunning).await {
            warn!(agent_type = %agent_type, error = %e, "Leased agent not runnable");
            drop(renewal);
            self.give_up(&agent_type).await;
            self.finish(&agent_type, id).await;
            return;
        }

        let interval = handles.interval;
        let may_store = {
            let lost = renewal.flag();
            let leases = Arc::clone(&self.leases);
            let agent_type = agent_type.clone();
            let node_id = self.node_id.clone();
            move || async move {
                if lost.load(Ordering::Acquire) {
                    return false;
                }
                matches!(leases.owner(&agent_type).await, Ok(Some(owner)) if owner == node_id)
            }
        };
        let outcome =
            execute_on_pool(&self.pool, handles, may_store, started_at, cancel.clone()).await;

        let lease_lost = renewal.is_lost() || matches!(outcome, ExecutionOutcome::Discarded);
        drop(renewal);

        let status = outcome.status();
        let delay = next_delay(&self.table, &self.intervals, &agent_type, &interval, &outcome).await;

        if *cancel.borrow() || outcome.is_cancelled() {
            debug!(agent_type = %agent_type, "Execution cancelled, releasing lease");
            self.release_lease(&agent_type).await;
            if let Err(e) = self.table.abandon(&agent_type, status, delay).await {
                debug!(agent_type = %agent_type, error = %e, "Agent left the table during execution");
            }
            self.finish(&agent_type, id).await;
            return;
        }

        let held = !lease_lost && self.hold_lease(&agent_type, delay).await;
        let recorded = if held {
            let hold = if delay < MIN_TTL_THRESHOLD {
                Duration::ZERO
            } else {
                delay
            };
            self.table.complete(&agent_type, status, delay, Some(hold)).await
        } else {
            self.release_lease(&agent_type).await;
            self.table.abandon(&agent_type, status, delay).await
        };
        if let Err(e) = recorded {
            debug!(agent_type = %agent_type, error = %e, "Agent left the table during execution");
        }

        self.finish(&agent_type, id).await;
    }

    /// Keep the lease until the next due time, or drop it when that is too
    /// close to bother. Returns false when the lease was no longer ours.
    async fn hold_lease(&self, agent_type: &str, until_next_run: Duration) -> bool {
        if until_next_run < MIN_TTL_THRESHOLD {
            self.release_lease(agent_type).await;
            return true;
        }
        match self
            .leases
            .renew(agent_type, &self.node_id, until_next_run)
            .await
        {
            Ok(true) => true,
            Ok(false) => false,
            Err(e) => {
                warn!(agent_type, error = %e, "Could not hold lease until next run");
                false
            }
        }
    }

    async fn release_lease(&self, agent_type: &str) {
        if let Err(e) = self.leases.release(agent_type, &self.node_id).await {
            warn!(agent_type, error = %e, "Lease release failed, it will expire on its own");
        }
    }

    /// Drop ownership of an agent: release the lease and reset its row.
    async fn give_up(&self, agent_type: &str) {
        self.release_lease(agent_type).await;
        if let Err(e) = self.table.release(agent_type).await {
            debug!(agent_type, error = %e, "Agent not released cleanly");
        }
    }

    async fn finish(&self, agent_type: &str, id: u64) {
        let mut active = self.active.lock().await;
        if active.get(agent_type).is_some_and(|execution| execution.id == id) {
            active.remove(agent_type);
        }
    }
}

#[async_trait]
impl AgentScheduler for ClusteredAgentScheduler {
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

        if self.table.state(&agent_type).await.is_some() {
            warn!(agent_type = %agent_type, "Agent type scheduled twice, replacing earlier agent");
            self.unschedule(&agent_type).await?;
        }

        let interval = self.intervals.interval_for(agent.as_ref());
        self.table
            .insert(AgentHandles {
                agent,
                execution,
                instrumentation,
                interval,
            })
            .await;
        debug!(agent_type = %agent_type, node_id = %self.node_id, "Agent registered for lease polling");
        Ok(())
    }

    /// Remove an agent. An in-flight execution is cancelled and this returns
    /// once it has stopped and its lease is released.
    async fn unschedule(&self, agent_type: &str) -> DomainResult<()> {
        let running = self.active.lock().await.remove(agent_type);
        let removed = self.table.remove(agent_type).await;
        if running.is_none() && removed.is_none() {
            return Err(DomainError::AgentNotScheduled(agent_type.to_string()));
        }

        let was_running = running.is_some();
        if let Some(execution) = running {
            execution.cancel(agent_type).await;
        }
        let owned = removed.as_ref().is_some_and(|(_, state)| state.is_owned());
        if owned || was_running {
            self.release_lease(agent_type).await;
        }
        if let Some((_, state)) = removed {
            debug!(agent_type, from = %state, "Agent unscheduled");
        }
        Ok(())
    }

    fn is_atomic(&self) -> bool {
        true
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
        if let Some(poller) = self.poller.lock().await.take() {
            if let Err(e) = poller.await {
                warn!(node_id = %self.node_id, error = %e, "Polling loop ended abnormally");
            }
        }

        let running: Vec<(String, ActiveExecution)> = self.active.lock().await.drain().collect();
        let cancelled = running.len();
        for (_, execution) in &running {
            execution.cancel.send_replace(true);
        }
        for (agent_type, execution) in running {
            execution.cancel(&agent_type).await;
        }

        let mut owned = self.table.in_state(AgentState::OwnedIdle).await;
        owned.extend(self.table.in_state(AgentState::OwnedRunning).await);
        for agent_type in owned {
            self.give_up(&agent_type).await;
        }

        self.pool.shutdown().await;
        info!(node_id = %self.node_id, cancelled, "Clustered agent scheduler stopped");
    }
}
