//! Domain models.

pub mod agent_data_type;
pub mod agent_state;
pub mod cache_data;
pub mod cache_filter;
pub mod config;
pub mod keys;
pub mod schedule;
pub mod store_summary;

pub use agent_data_type::{authoritative_types, AgentDataType, Authority};
pub use agent_state::AgentState;
pub use cache_data::{CacheData, CacheResult};
pub use cache_filter::CacheFilter;
pub use config::{
    AgentIntervalConfig, CacheConfig, Config, FailureBackoffConfig, LeaseConfig, LoggingConfig,
    NodeConfig, ProviderCacheConfig, SchedulerConfig, SchedulerKind, ShardingConfig, ShardingKey,
};
pub use keys::{Keys, ParsedKey};
pub use schedule::{
    AccountScope, AgentInterval, CustomSchedule, ExecutionStatus, FailureBackoff, FailureClass,
};
pub use store_summary::{NamespaceSummary, StoreSummary};
