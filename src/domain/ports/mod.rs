//! Port trait definitions (Hexagonal Architecture)
//!
//! Contracts the scheduler and caching services depend on:
//! - Cache / WriteableCache: keyed entry storage
//! - NamedCacheFactory: one cache per provider name
//! - Agent / CachingAgent / AgentExecution: units of work
//! - Provider: named groups of agents
//! - AgentScheduler: periodic triggering and ownership
//! - LeaseStore / MembershipRegistry: fleet coordination primitives

pub mod agent;
pub mod agent_scheduler;
pub mod cache;
pub mod instrumentation;
pub mod lease_store;
pub mod membership;
pub mod named_cache_factory;
pub mod node_status;
pub mod provider;
pub mod sharding;

pub use agent::{Agent, AgentExecution, CachingAgent};
pub use agent_scheduler::{AgentScheduler, AgentSchedulerAware, ScheduledAgentStatus};
pub use cache::{validate_namespace, Cache, CacheStats, WriteableCache};
pub use instrumentation::ExecutionInstrumentation;
pub use lease_store::LeaseStore;
pub use membership::MembershipRegistry;
pub use named_cache_factory::NamedCacheFactory;
pub use node_status::NodeStatusProvider;
pub use provider::Provider;
pub use sharding::ShardingFilter;
