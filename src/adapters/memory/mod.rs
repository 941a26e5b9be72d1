//! In-process implementations of the storage, lease and membership ports.

pub mod cache;
pub mod lease_store;
pub mod membership;
pub mod named_cache_factory;

pub use cache::InMemoryCache;
pub use lease_store::InMemoryLeaseStore;
pub use membership::InMemoryMembershipRegistry;
pub use named_cache_factory::InMemoryNamedCacheFactory;
