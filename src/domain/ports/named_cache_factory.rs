//! Cache factory port.

use std::sync::Arc;

use super::cache::WriteableCache;

/// Hands out one cache instance per name.
///
/// Implementations must return the same instance for the same name for the
/// lifetime of the factory, including under concurrent first access.
pub trait NamedCacheFactory: Send + Sync {
    /// Cache named `name`, created on first use.
    fn get_cache(&self, name: &str) -> Arc<dyn WriteableCache>;
}
