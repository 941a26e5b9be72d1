//! Node identity and node status.

use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::domain::models::NodeConfig;
use crate::domain::ports::NodeStatusProvider;

/// Stable identity of this process within the fleet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    id: String,
}

impl NodeIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Use the configured identity, or `<hostname>-<random suffix>`.
    pub fn from_config(config: &NodeConfig) -> Self {
        if let Some(id) = config.identity.as_deref().filter(|id| !id.trim().is_empty()) {
            return Self::new(id);
        }
        let host = std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "cats".to_string());
        let suffix = Uuid::new_v4().simple().to_string();
        Self::new(format!("{host}-{}", &suffix[..8]))
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// Node that always takes on work.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysEnabled;

impl NodeStatusProvider for AlwaysEnabled {
    fn is_node_enabled(&self) -> bool {
        true
    }
}

/// Node status that can be flipped at runtime, e.g. to drain a node.
#[derive(Debug)]
pub struct SwitchableNodeStatus {
    enabled: AtomicBool,
}

impl SwitchableNodeStatus {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    /// Takes effect on the next lease poll.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}

impl NodeStatusProvider for SwitchableNodeStatus {
    fn is_node_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}
