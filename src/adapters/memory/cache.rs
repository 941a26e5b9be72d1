//! In-memory `WriteableCache`.
//!
//! Entries live in a map of namespace -> id -> entry behind one `RwLock`, so a
//! namespace snapshot never observes a half-applied batch. Writes are applied in
//! batches (`max_merge_batch_size` / `max_evict_batch_size`), releasing the lock
//! between batches. With hashing enabled every stored entry remembers the
//! blake3 digest of the last item merged into it and identical merges are
//! skipped.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CacheConfig, CacheData, CacheFilter};
use crate::domain::ports::{validate_namespace, Cache, CacheStats, WriteableCache};

struct StoredEntry {
    data: CacheData,
    digest: Option<blake3::Hash>,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

type Namespaces = HashMap<String, HashMap<String, StoredEntry>>;

/// Cache store kept entirely in process memory.
pub struct InMemoryCache {
    name: String,
    config: CacheConfig,
    namespaces: RwLock<Namespaces>,
    merged: AtomicU64,
    skipped_unchanged: AtomicU64,
    evicted: AtomicU64,
    reads: AtomicU64,
}

impl InMemoryCache {
    /// Empty cache. `name` only shows up in logs.
    pub fn new(name: impl Into<String>, config: CacheConfig) -> Self {
        Self {
            name: name.into(),
            config,
            namespaces: RwLock::new(HashMap::new()),
            merged: AtomicU64::new(0),
            skipped_unchanged: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            reads: AtomicU64::new(0),
        }
    }

    /// Name given at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespaces that currently hold at least one live entry.
    pub async fn namespaces(&self) -> Vec<String> {
        let now = Instant::now();
        let guard = self.namespaces.read().await;
        let mut names: Vec<String> = guard
            .iter()
            .filter(|(_, entries)| entries.values().any(|e| e.is_live(now)))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Canonical digest of an item. Converting through `serde_json::Value`
    /// sorts map keys, so equal items always hash equally.
    fn digest(item: &CacheData) -> DomainResult<blake3::Hash> {
        let canonical = serde_json::to_value(item)?;
        let bytes = serde_json::to_vec(&canonical)?;
        Ok(blake3::hash(&bytes))
    }

    fn merge_one(&self, entries: &mut HashMap<String, StoredEntry>, item: CacheData, now: Instant) -> DomainResult<()> {
        let digest = if self.config.hashing_enabled {
            Some(Self::digest(&item)?)
        } else {
            None
        };
        let expires_at = item
            .ttl_seconds
            .map(|secs| now + Duration::from_secs(secs));

        match entries.get_mut(&item.id) {
            Some(existing) if existing.is_live(now) => {
                if digest.is_some() && existing.digest == digest {
                    if expires_at.is_some() {
                        existing.expires_at = expires_at;
                    }
                    self.skipped_unchanged.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                existing.data.merge_from(item);
                existing.digest = digest;
                if expires_at.is_some() {
                    existing.expires_at = expires_at;
                }
            }
            _ => {
                entries.insert(
                    item.id.clone(),
                    StoredEntry {
                        data: item,
                        digest,
                        expires_at,
                    },
                );
            }
        }
        self.merged.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn materialize(data: &CacheData, filter: Option<&CacheFilter>) -> CacheData {
        match filter {
            None => data.clone(),
            Some(filter) => {
                let mut copy = CacheData {
                    id: data.id.clone(),
                    attributes: data.attributes.clone(),
                    relationships: HashMap::new(),
                    ttl_seconds: data.ttl_seconds,
                };
                for (relationship, ids) in &data.relationships {
                    if filter.allows(relationship) {
                        copy.relationships.insert(relationship.clone(), ids.clone());
                    }
                }
                copy
            }
        }
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_all_by_ids(
        &self,
        namespace: &str,
        ids: &[String],
        filter: Option<&CacheFilter>,
    ) -> DomainResult<Vec<CacheData>> {
        validate_namespace(namespace)?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let guard = self.namespaces.read().await;
        let Some(entries) = guard.get(namespace) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| entries.get(id))
            .filter(|entry| entry.is_live(now))
            .map(|entry| Self::materialize(&entry.data, filter))
            .collect())
    }

    async fn get_identifiers(&self, namespace: &str) -> DomainResult<Vec<String>> {
        validate_namespace(namespace)?;
        let now = Instant::now();
        let guard = self.namespaces.read().await;
        let mut ids: Vec<String> = guard
            .get(namespace)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, entry)| entry.is_live(now))
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default();
        ids.sort();
        Ok(ids)
    }

    async fn get_all_filtered(
        &self,
        namespace: &str,
        filter: &CacheFilter,
    ) -> DomainResult<Vec<CacheData>> {
        self.snapshot(namespace, Some(filter)).await
    }

    async fn get_all(&self, namespace: &str) -> DomainResult<Vec<CacheData>> {
        self.snapshot(namespace, None).await
    }
}

impl InMemoryCache {
    async fn snapshot(
        &self,
        namespace: &str,
        filter: Option<&CacheFilter>,
    ) -> DomainResult<Vec<CacheData>> {
        validate_namespace(namespace)?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let guard = self.namespaces.read().await;
        let mut items: Vec<CacheData> = guard
            .get(namespace)
            .map(|entries| {
                entries
                    .values()
                    .filter(|entry| entry.is_live(now))
                    .map(|entry| Self::materialize(&entry.data, filter))
                    .collect()
            })
            .unwrap_or_default();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }
}

#[async_trait]
impl WriteableCache for InMemoryCache {
    async fn merge(&self, namespace: &str, item: CacheData) -> DomainResult<()> {
        self.merge_all(namespace, vec![item]).await
    }

    async fn merge_all(&self, namespace: &str, items: Vec<CacheData>) -> DomainResult<()> {
        validate_namespace(namespace)?;
        let batch_size = self.config.max_merge_batch_size.max(1);
        let mut items = items.into_iter().peekable();

        while items.peek().is_some() {
            let now = Instant::now();
            let mut guard = self.namespaces.write().await;
            let entries = guard.entry(namespace.to_string()).or_default();
            entries.retain(|_, entry| entry.is_live(now));
            for item in items.by_ref().take(batch_size) {
                self.merge_one(entries, item, now)?;
            }
        }
        Ok(())
    }

    async fn evict(&self, namespace: &str, id: &str) -> DomainResult<()> {
        self.evict_all(namespace, &[id.to_string()]).await
    }

    async fn evict_all(&self, namespace: &str, ids: &[String]) -> DomainResult<()> {
        validate_namespace(namespace)?;
        for batch in ids.chunks(self.config.max_evict_batch_size.max(1)) {
            let mut guard = self.namespaces.write().await;
            let Some(entries) = guard.get_mut(namespace) else {
                return Ok(());
            };
            let removed = batch
                .iter()
                .filter(|id| entries.remove(id.as_str()).is_some())
                .count();
            self.evicted.fetch_add(removed as u64, Ordering::Relaxed);
        }
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            merged: self.merged.load(Ordering::Relaxed),
            skipped_unchanged: self.skipped_unchanged.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
        }
    }
}
