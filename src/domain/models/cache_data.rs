//! Cache entries and agent results.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// One normalized resource within a cache namespace.
///
/// Relationships are directed edges by id only. An edge may point at an id
/// that is not (or not yet) present in the cache; readers must tolerate that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheData {
    /// Identifier, unique within the namespace
    pub id: String,

    /// Provider-specific resource properties
    #[serde(default)]
    pub attributes: HashMap<String, Value>,

    /// Relationship type -> ids of related entries
    #[serde(default)]
    pub relationships: HashMap<String, BTreeSet<String>>,

    /// Optional expiry for the stored entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
}

impl CacheData {
    /// Entry with no attributes or relationships.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: HashMap::new(),
            relationships: HashMap::new(),
            ttl_seconds: None,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: HashMap<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Add ids to a relationship type, keeping any ids already present.
    pub fn with_relationship<I, S>(mut self, relationship: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relationships
            .entry(relationship.into())
            .or_default()
            .extend(ids.into_iter().map(Into::into));
        self
    }

    /// Expire the entry this many seconds after it is stored.
    pub fn with_ttl_seconds(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = Some(ttl_seconds);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Ids related to this entry under `relationship`.
    pub fn related(&self, relationship: &str) -> impl Iterator<Item = &str> {
        self.relationships
            .get(relationship)
            .into_iter()
            .flat_map(|ids| ids.iter().map(String::as_str))
    }

    /// Apply an incoming version of this entry on top of the stored one.
    ///
    /// Non-empty incoming attributes replace the stored attributes wholesale.
    /// Each relationship type carried by `incoming` replaces the stored set for
    /// that type; relationship types it does not mention are kept.
    pub fn merge_from(&mut self, incoming: CacheData) {
        if !incoming.attributes.is_empty() {
            self.attributes = incoming.attributes;
        }
        for (relationship, ids) in incoming.relationships {
            self.relationships.insert(relationship, ids);
        }
        if incoming.ttl_seconds.is_some() {
            self.ttl_seconds = incoming.ttl_seconds;
        }
    }
}

/// Output of one caching cycle: items per namespace plus explicit evictions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheResult {
    /// Entries to merge, per namespace.
    #[serde(default)]
    pub cache_results: HashMap<String, Vec<CacheData>>,

    /// Ids to evict, per namespace.
    #[serde(default)]
    pub evictions: HashMap<String, Vec<String>>,
}

impl CacheResult {
    /// Empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record items for a namespace. Declaring a namespace with no items is
    /// meaningful: it reports "this cycle found nothing".
    pub fn with_items(mut self, namespace: impl Into<String>, items: Vec<CacheData>) -> Self {
        self.cache_results
            .entry(namespace.into())
            .or_default()
            .extend(items);
        self
    }

    /// Report `ids` in `namespace` as gone.
    pub fn with_evictions<I, S>(mut self, namespace: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.evictions
            .entry(namespace.into())
            .or_default()
            .extend(ids.into_iter().map(Into::into));
        self
    }

    /// Entries for `namespace`, empty when there are none.
    pub fn items(&self, namespace: &str) -> &[CacheData] {
        self.cache_results
            .get(namespace)
            .map_or(&[], Vec::as_slice)
    }

    /// Entries across all namespaces.
    pub fn total_items(&self) -> usize {
        self.cache_results.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_items() == 0 && self.evictions.values().all(Vec::is_empty)
    }
}
