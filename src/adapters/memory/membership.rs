//! In-memory membership registry.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::errors::DomainResult;
use crate::domain::ports::MembershipRegistry;

/// Membership registry with per-member expiry.
#[derive(Default)]
pub struct InMemoryMembershipRegistry {
    members: Mutex<HashMap<String, Instant>>,
}

impl InMemoryMembershipRegistry {
    /// Registry with no members.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MembershipRegistry for InMemoryMembershipRegistry {
    async fn heartbeat(&self, node_id: &str, ttl: Duration) -> DomainResult<()> {
        let mut members = self.members.lock().await;
        members.insert(node_id.to_string(), Instant::now() + ttl);
        Ok(())
    }

    async fn live_members(&self) -> DomainResult<Vec<String>> {
        let now = Instant::now();
        let mut members = self.members.lock().await;
        members.retain(|_, expires_at| *expires_at > now);
        let mut live: Vec<String> = members.keys().cloned().collect();
        live.sort();
        Ok(live)
    }

    async fn leave(&self, node_id: &str) -> DomainResult<()> {
        self.members.lock().await.remove(node_id);
        Ok(())
    }
}
