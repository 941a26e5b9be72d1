//! In-memory lease store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::errors::DomainResult;
use crate::domain::ports::LeaseStore;

struct LeaseRecord {
    owner: String,
    expires_at: Instant,
}

/// Lease store shared by every scheduler in one process.
///
/// Expiry is evaluated against the tokio clock, so tests with a paused clock
/// control it through `tokio::time::advance`.
#[derive(Default)]
pub struct InMemoryLeaseStore {
    leases: Mutex<HashMap<String, LeaseRecord>>,
}

impl InMemoryLeaseStore {
    /// Store with no leases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining lifetime of a live lease.
    pub async fn remaining(&self, agent_type: &str) -> Option<Duration> {
        let now = Instant::now();
        let leases = self.leases.lock().await;
        leases
            .get(agent_type)
            .filter(|lease| lease.expires_at > now)
            .map(|lease| lease.expires_at - now)
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn try_acquire(&self, agent_type: &str, owner: &str, ttl: Duration) -> DomainResult<bool> {
        let now = Instant::now();
        let mut leases = self.leases.lock().await;
        if let Some(existing) = leases.get(agent_type) {
            if existing.expires_at > now {
                return Ok(false);
            }
        }
        leases.insert(
            agent_type.to_string(),
            LeaseRecord {
                owner: owner.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn renew(&self, agent_type: &str, owner: &str, ttl: Duration) -> DomainResult<bool> {
        let now = Instant::now();
        let mut leases = self.leases.lock().await;
        match leases.get_mut(agent_type) {
            Some(lease) if lease.owner == owner && lease.expires_at > now => {
                lease.expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, agent_type: &str, owner: &str) -> DomainResult<bool> {
        let now = Instant::now();
        let mut leases = self.leases.lock().await;
        let held = leases
            .get(agent_type)
            .filter(|lease| lease.owner == owner)
            .map(|lease| lease.expires_at > now);
        match held {
            Some(was_live) => {
                leases.remove(agent_type);
                Ok(was_live)
            }
            None => Ok(false),
        }
    }

    async fn owner(&self, agent_type: &str) -> DomainResult<Option<String>> {
        let now = Instant::now();
        let leases = self.leases.lock().await;
        Ok(leases
            .get(agent_type)
            .filter(|lease| lease.expires_at > now)
            .map(|lease| lease.owner.clone()))
    }
}
