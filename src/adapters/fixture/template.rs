//! YAML shape of a fixture file.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::domain::models::AgentDataType;

/// Top-level fixture document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureTemplate {
    /// Providers to build, in order.
    #[serde(default)]
    pub providers: Vec<ProviderTemplate>,
}

impl FixtureTemplate {
    /// Every namespace some agent declares.
    pub fn namespaces(&self) -> BTreeSet<String> {
        self.providers
            .iter()
            .flat_map(|provider| &provider.agents)
            .flat_map(|agent| &agent.data_types)
            .map(|data_type| data_type.type_name.clone())
            .collect()
    }
}

/// One provider and its agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderTemplate {
    /// Provider name, also the cache name.
    pub name: String,
    /// Evict ids missing from an authoritative result.
    #[serde(default)]
    pub supports_full_eviction: bool,
    /// Agents of this provider.
    #[serde(default)]
    pub agents: Vec<AgentTemplate>,
}

/// One simulated caching agent.
///
/// The agent type defaults to `<account>/<region>/<name>`, or
/// `<account>/<name>` for agents without a region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTemplate {
    /// Overrides the derived `<provider>/<account>[/<region>]/<name>` agent type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    /// Account the agent caches.
    pub account: String,
    /// Region, for regional agents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Resource kind, last segment of the agent type.
    pub name: String,
    /// Namespaces the agent writes and its authority over each.
    pub data_types: Vec<AgentDataType>,
    /// Custom interval, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    /// Custom error interval, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_interval_ms: Option<u64>,
    /// Custom execution timeout, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Simulated provider call latency
    #[serde(default)]
    pub latency_ms: u64,
    /// Results returned on successive runs; the last one repeats.
    #[serde(default)]
    pub cycles: Vec<CycleTemplate>,
}

/// What the simulated provider returns on one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleTemplate {
    /// Entries returned per namespace.
    #[serde(default)]
    pub resources: BTreeMap<String, Vec<ResourceTemplate>>,
    /// Ids reported gone per namespace.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub evictions: BTreeMap<String, Vec<String>>,
    /// When set, the provider call fails with this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// A provider resource. `id` and relationship targets are raw resource
/// names; the agent turns them into structured keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTemplate {
    /// Raw resource name.
    pub id: String,
    /// Attributes stored as-is.
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
    /// Related resource names per namespace.
    #[serde(default)]
    pub relationships: BTreeMap<String, Vec<String>>,
    /// Entry TTL in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
}
