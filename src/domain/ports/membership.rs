//! Fleet membership port.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::errors::DomainResult;

/// Registry of live fleet members, kept alive by heartbeats.
#[async_trait]
pub trait MembershipRegistry: Send + Sync {
    /// Record that `node_id` is alive for the next `ttl`.
    async fn heartbeat(&self, node_id: &str, ttl: Duration) -> DomainResult<()>;

    /// Members whose last heartbeat has not expired, sorted.
    async fn live_members(&self) -> DomainResult<Vec<String>>;

    /// Remove `node_id` right away instead of waiting for its heartbeat to lapse.
    async fn leave(&self, node_id: &str) -> DomainResult<()>;
}
