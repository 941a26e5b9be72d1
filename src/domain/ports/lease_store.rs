//! Lease store port.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::errors::DomainResult;

/// TTL-bounded ownership records keyed by agent type.
///
/// First lease wins: a live lease is never taken over, only left to expire.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Claim the lease if nobody holds a live one.
    async fn try_acquire(&self, agent_type: &str, owner: &str, ttl: Duration) -> DomainResult<bool>;

    /// Reset the TTL of a lease still held by `owner`. Returns false when the
    /// lease expired or belongs to someone else.
    async fn renew(&self, agent_type: &str, owner: &str, ttl: Duration) -> DomainResult<bool>;

    /// Drop a lease held by `owner`. Returns false when there was nothing to drop.
    async fn release(&self, agent_type: &str, owner: &str) -> DomainResult<bool>;

    /// Current holder of a live lease.
    async fn owner(&self, agent_type: &str) -> DomainResult<Option<String>>;
}
