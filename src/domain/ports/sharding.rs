//! Sharding port.

use async_trait::async_trait;

use super::agent::Agent;

/// Decides whether this node should try to own an agent.
#[async_trait]
pub trait ShardingFilter: Send + Sync {
    /// True when this node should try to lease `agent`.
    async fn filter(&self, agent: &dyn Agent) -> bool;
}
