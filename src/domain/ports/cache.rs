//! Cache ports.
//!
//! `Cache` is the read side shared by provider caches and the composite view;
//! `WriteableCache` adds upserts and evictions. Namespaces ("types") partition
//! entries and `(namespace, id)` identifies one entry.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CacheData, CacheFilter};

/// Counters exposed by a cache store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Entries written.
    pub merged: u64,
    /// Merges skipped because the stored entry was identical.
    pub skipped_unchanged: u64,
    /// Entries evicted.
    pub evicted: u64,
    /// Read calls served.
    pub reads: u64,
}

/// Read access to cached entries
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch the given ids. Ids that are not present are left out of the result.
    async fn get_all_by_ids(
        &self,
        namespace: &str,
        ids: &[String],
        filter: Option<&CacheFilter>,
    ) -> DomainResult<Vec<CacheData>>;

    /// All ids currently stored in a namespace.
    async fn get_identifiers(&self, namespace: &str) -> DomainResult<Vec<String>>;

    /// One entry, `None` when absent.
    async fn get(&self, namespace: &str, id: &str) -> DomainResult<Option<CacheData>> {
        let mut found = self
            .get_all_by_ids(namespace, &[id.to_string()], None)
            .await?;
        Ok(found.pop())
    }

    /// Like `get`, keeping only relationships `filter` allows.
    async fn get_filtered(
        &self,
        namespace: &str,
        id: &str,
        filter: &CacheFilter,
    ) -> DomainResult<Option<CacheData>> {
        let mut found = self
            .get_all_by_ids(namespace, &[id.to_string()], Some(filter))
            .await?;
        Ok(found.pop())
    }

    /// Every entry in `namespace`.
    async fn get_all(&self, namespace: &str) -> DomainResult<Vec<CacheData>> {
        let ids = self.get_identifiers(namespace).await?;
        self.get_all_by_ids(namespace, &ids, None).await
    }

    /// Every entry in `namespace`, relationships filtered.
    async fn get_all_filtered(
        &self,
        namespace: &str,
        filter: &CacheFilter,
    ) -> DomainResult<Vec<CacheData>> {
        let ids = self.get_identifiers(namespace).await?;
        self.get_all_by_ids(namespace, &ids, Some(filter)).await
    }

    /// Ids in a namespace matching a glob such as `aws:instances:prod:*`.
    async fn filter_identifiers(&self, namespace: &str, pattern: &str) -> DomainResult<Vec<String>> {
        let glob = glob::Pattern::new(pattern).map_err(|e| DomainError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        let ids = self.get_identifiers(namespace).await?;
        Ok(ids.into_iter().filter(|id| glob.matches(id)).collect())
    }
}

/// A cache that can be written to
#[async_trait]
pub trait WriteableCache: Cache {
    /// Upsert one entry.
    async fn merge(&self, namespace: &str, item: CacheData) -> DomainResult<()>;

    /// Upsert many entries, applied in batches.
    async fn merge_all(&self, namespace: &str, items: Vec<CacheData>) -> DomainResult<()>;

    /// Remove one entry. Removing an absent id is a no-op.
    async fn evict(&self, namespace: &str, id: &str) -> DomainResult<()>;

    /// Remove many entries, applied in batches.
    async fn evict_all(&self, namespace: &str, ids: &[String]) -> DomainResult<()>;

    /// Write and read counters since creation.
    fn stats(&self) -> CacheStats;
}

/// Reject namespaces no store can address.
pub fn validate_namespace(namespace: &str) -> DomainResult<()> {
    if namespace.trim().is_empty() {
        return Err(DomainError::InvalidNamespace(namespace.to_string()));
    }
    Ok(())
}
