//! Caching services: provider caches, registry, instrumentation, cadence and sharding.

pub mod cache_execution;
pub mod composite_cache;
pub mod default_provider;
pub mod instrumentation;
pub mod interval_provider;
pub mod node_identity;
pub mod provider_cache;
pub mod provider_registry;
pub mod sharding;

pub use cache_execution::CacheExecution;
pub use composite_cache::CompositeCache;
pub use default_provider::DefaultProvider;
pub use instrumentation::{
    AgentMetrics, CompositeExecutionInstrumentation, LoggingExecutionInstrumentation,
    MetricsExecutionInstrumentation,
};
pub use interval_provider::AgentIntervalProvider;
pub use node_identity::{AlwaysEnabled, NodeIdentity, SwitchableNodeStatus};
pub use provider_cache::{ProviderCache, SOURCE_INDEX_NAMESPACE};
pub use provider_registry::ProviderRegistry;
pub use sharding::{MembershipObserver, MemberList, NoopShardingFilter, RendezvousShardingFilter};
