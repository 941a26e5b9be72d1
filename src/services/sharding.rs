//! Fleet sharding.
//!
//! Live members announce themselves through a `MembershipRegistry`; the
//! `MembershipObserver` keeps a local copy of the member list which the
//! `RendezvousShardingFilter` uses to decide which agents this node should
//! try to lease. Sharding only spreads load, leases remain the source of
//! mutual exclusion.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::models::{ShardingConfig, ShardingKey};
use crate::domain::ports::{Agent, MembershipRegistry, ShardingFilter};

/// Accepts every agent.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopShardingFilter;

#[async_trait]
impl ShardingFilter for NoopShardingFilter {
    async fn filter(&self, _agent: &dyn Agent) -> bool {
        true
    }
}

/// Value an agent is sharded on.
pub fn sharding_key(agent: &dyn Agent, key: ShardingKey) -> String {
    match (key, agent.account_scope()) {
        (ShardingKey::AgentType, _) | (_, None) => agent.agent_type().to_string(),
        (ShardingKey::Account, Some(scope)) => scope.account,
        (ShardingKey::AccountRegion, Some(scope)) => match scope.region {
            Some(region) => format!("{}/{region}", scope.account),
            None => scope.account,
        },
    }
}

fn weight(member: &str, key: &str) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(member.as_bytes());
    hasher.update(&[0]);
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_be_bytes(bytes)
}

/// Highest-random-weight owner of `key` among `members`.
///
/// Ties resolve to the lexicographically smallest member.
pub fn rendezvous_owner<'a>(members: &'a [String], key: &str) -> Option<&'a str> {
    members
        .iter()
        .map(|member| (weight(member, key), member.as_str()))
        .max_by(|(wa, ma), (wb, mb)| wa.cmp(wb).then_with(|| mb.cmp(ma)))
        .map(|(_, member)| member)
}

/// Shared, periodically refreshed list of live members.
#[derive(Debug, Clone, Default)]
pub struct MemberList {
    members: Arc<RwLock<Vec<String>>>,
}

impl MemberList {
    pub fn new(initial: Vec<String>) -> Self {
        Self {
            members: Arc::new(RwLock::new(initial)),
        }
    }

    /// Snapshot of the current members.
    pub async fn get(&self) -> Vec<String> {
        self.members.read().await.clone()
    }

    /// Replace the list; it is kept sorted and deduplicated.
    pub async fn replace(&self, mut members: Vec<String>) {
        members.sort();
        members.dedup();
        *self.members.write().await = members;
    }
}

/// Keeps the agents whose rendezvous owner is this node.
pub struct RendezvousShardingFilter {
    node_id: String,
    key: ShardingKey,
    members: MemberList,
}

impl RendezvousShardingFilter {
    /// Filter for `node_id`, hashing agents on `key`.
    pub fn new(node_id: impl Into<String>, key: ShardingKey, members: MemberList) -> Self {
        Self {
            node_id: node_id.into(),
            key,
            members,
        }
    }
}

#[async_trait]
impl ShardingFilter for RendezvousShardingFilter {
    async fn filter(&self, agent: &dyn Agent) -> bool {
        let mut members = self.members.get().await;
        if !members.iter().any(|m| m == &self.node_id) {
            members.push(self.node_id.clone());
        }
        let key = sharding_key(agent, self.key);
        rendezvous_owner(&members, &key) == Some(self.node_id.as_str())
    }
}

/// Heartbeats this node into the membership registry and refreshes the
/// local member list.
pub struct MembershipObserver {
    node_id: String,
    registry: Arc<dyn MembershipRegistry>,
    config: ShardingConfig,
    members: MemberList,
    running: AtomicBool,
    stop_tx: watch::Sender<bool>,
}

impl MembershipObserver {
    /// Observer heartbeating as `node_id`. Call `start` to begin.
    pub fn new(
        node_id: impl Into<String>,
        registry: Arc<dyn MembershipRegistry>,
        config: ShardingConfig,
    ) -> Self {
        let node_id = node_id.into();
        let (stop_tx, _) = watch::channel(false);
        Self {
            members: MemberList::new(vec![node_id.clone()]),
            node_id,
            registry,
            config,
            running: AtomicBool::new(false),
            stop_tx,
        }
    }

    /// List kept up to date by the observer.
    pub fn members(&self) -> MemberList {
        self.members.clone()
    }

    /// One heartbeat plus refresh. A failing registry leaves the last known
    /// member list in place.
    pub async fn refresh(&self) {
        if let Err(e) = self
            .registry
            .heartbeat(&self.node_id, self.config.member_ttl())
            .await
        {
            warn!(node_id = %self.node_id, error = %e, "Membership heartbeat failed");
        }
        match self.registry.live_members().await {
            Ok(live) => {
                debug!(node_id = %self.node_id, members = live.len(), "Membership refreshed");
                self.members.replace(live).await;
            }
            Err(e) => {
                warn!(
                    node_id = %self.node_id,
                    error = %e,
                    "Membership refresh failed, keeping last known members"
                );
            }
        }
    }

    /// Start the heartbeat loop. Calling `start` on a running observer is a no-op.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.running.swap(true, Ordering::AcqRel) {
            return None;
        }
        let observer = Arc::clone(self);
        let mut stop_rx = self.stop_tx.subscribe();
        Some(tokio::spawn(async move {
            info!(node_id = %observer.node_id, "Membership observer started");
            loop {
                observer.refresh().await;
                tokio::select! {
                    () = tokio::time::sleep(observer.config.heartbeat_interval()) => {}
                    _ = stop_rx.changed() => break,
                }
            }
            if let Err(e) = observer.registry.leave(&observer.node_id).await {
                warn!(node_id = %observer.node_id, error = %e, "Failed to leave membership");
            }
            info!(node_id = %observer.node_id, "Membership observer stopped");
        }))
    }

    /// Stop heartbeating. The observer loop exits on its next tick.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }
}
