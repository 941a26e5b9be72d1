//! What one store did to a provider cache.

use serde::Serialize;
use std::collections::BTreeMap;

/// What one `put_cache_result` call did to a single namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NamespaceSummary {
    /// Entries written.
    pub merged: usize,
    /// Entries evicted.
    pub evicted: usize,
    /// Evictions were withheld by the full-eviction safeguard.
    pub eviction_skipped: bool,
}

/// Per-namespace outcome of storing a `CacheResult`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    /// Counts per namespace.
    pub namespaces: BTreeMap<String, NamespaceSummary>,
}

impl StoreSummary {
    pub fn namespace(&self, namespace: &str) -> Option<&NamespaceSummary> {
        self.namespaces.get(namespace)
    }

    pub(crate) fn entry(&mut self, namespace: &str) -> &mut NamespaceSummary {
        self.namespaces.entry(namespace.to_string()).or_default()
    }

    /// Entries written across all namespaces.
    pub fn merged(&self) -> usize {
        self.namespaces.values().map(|n| n.merged).sum()
    }

    /// Entries evicted across all namespaces.
    pub fn evicted(&self) -> usize {
        self.namespaces.values().map(|n| n.evicted).sum()
    }
}
