//! Configuration model, deserialized by the config loader.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::schedule::FailureBackoff;

/// Main configuration structure for a CATS node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Node identity configuration
    #[serde(default)]
    pub node: NodeConfig,

    /// Scheduler and worker pool configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Default agent cadence
    #[serde(default)]
    pub agent: AgentIntervalConfig,

    /// Agent lease configuration (clustered scheduler)
    #[serde(default)]
    pub lease: LeaseConfig,

    /// Fleet membership and sharding configuration
    #[serde(default)]
    pub sharding: ShardingConfig,

    /// Cache store configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Per-provider cache behaviour, keyed by provider name
    #[serde(default)]
    pub providers: HashMap<String, ProviderCacheConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Cache behaviour for a provider, falling back to defaults.
    pub fn provider_cache(&self, provider_name: &str) -> ProviderCacheConfig {
        self.providers
            .get(provider_name)
            .cloned()
            .unwrap_or_default()
    }
}

/// Node identity configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NodeConfig {
    /// Explicit node identity; generated from host name and a uuid when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

/// Which scheduler implementation drives agents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    /// Single node, every agent runs locally
    #[default]
    Default,
    /// Fleet-wide leases and sharding
    Clustered,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Scheduler implementation
    #[serde(default)]
    pub kind: SchedulerKind,

    /// Number of worker tasks executing agents
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Maximum queued executions waiting for a worker
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Maximum agents owned and active on this node at once (clustered)
    #[serde(default = "default_max_concurrent_agents")]
    pub max_concurrent_agents: usize,

    /// Lease polling period in milliseconds (clustered)
    #[serde(default = "default_lock_acquisition_interval_ms")]
    pub lock_acquisition_interval_ms: u64,

    /// Upper bound of the random initial delay, in milliseconds
    #[serde(default = "default_max_initial_jitter_ms")]
    pub max_initial_jitter_ms: u64,

    /// Regex an agent type (lower-cased) must match to be scheduled
    #[serde(default = "default_enabled_pattern")]
    pub enabled_pattern: String,

    /// Regex excluding agent types (lower-cased) from scheduling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_pattern: Option<String>,

    /// Optional cap on execution starts per second across the pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_executions_per_second: Option<u32>,
}

const fn default_pool_size() -> usize {
    16
}

const fn default_queue_capacity() -> usize {
    1024
}

const fn default_max_concurrent_agents() -> usize {
    1000
}

const fn default_lock_acquisition_interval_ms() -> u64 {
    1000
}

const fn default_max_initial_jitter_ms() -> u64 {
    30_000
}

fn default_enabled_pattern() -> String {
    ".*".to_string()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            kind: SchedulerKind::default(),
            pool_size: default_pool_size(),
            queue_capacity: default_queue_capacity(),
            max_concurrent_agents: default_max_concurrent_agents(),
            lock_acquisition_interval_ms: default_lock_acquisition_interval_ms(),
            max_initial_jitter_ms: default_max_initial_jitter_ms(),
            enabled_pattern: default_enabled_pattern(),
            disabled_pattern: None,
            max_executions_per_second: None,
        }
    }
}

impl SchedulerConfig {
    /// Poll period of the clustered scheduler.
    pub fn lock_acquisition_interval(&self) -> Duration {
        Duration::from_millis(self.lock_acquisition_interval_ms)
    }

    pub fn max_initial_jitter(&self) -> Duration {
        Duration::from_millis(self.max_initial_jitter_ms)
    }
}

/// Default agent cadence, overridable per agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentIntervalConfig {
    /// Delay after a successful run, in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Delay after a failed run, in milliseconds
    #[serde(default = "default_error_interval_ms")]
    pub error_interval_ms: u64,

    /// Maximum duration of one execution, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Failure-class aware backoff replacing the flat error interval
    #[serde(default)]
    pub failure_backoff: FailureBackoffConfig,
}

const fn default_interval_ms() -> u64 {
    30_000
}

const fn default_error_interval_ms() -> u64 {
    60_000
}

const fn default_timeout_ms() -> u64 {
    300_000
}

impl Default for AgentIntervalConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            error_interval_ms: default_error_interval_ms(),
            timeout_ms: default_timeout_ms(),
            failure_backoff: FailureBackoffConfig::default(),
        }
    }
}

/// Backoff after failed runs, chosen by failure class
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FailureBackoffConfig {
    /// Use class-based backoff; failures wait `error_interval_ms` when off
    #[serde(default)]
    pub enabled: bool,

    /// Transient failures retried immediately before the error interval applies
    #[serde(default)]
    pub max_immediate_retries: u32,

    /// Fixed delay after authorization failures, in milliseconds
    #[serde(default = "default_permanent_forbidden_backoff_ms")]
    pub permanent_forbidden_backoff_ms: u64,

    /// First delay after a throttled run, in milliseconds
    #[serde(default = "default_throttled_base_ms")]
    pub throttled_base_ms: u64,

    /// Growth factor per consecutive throttled run
    #[serde(default = "default_throttled_multiplier")]
    pub throttled_multiplier: f64,

    /// Upper bound of the throttled delay, in milliseconds
    #[serde(default = "default_throttled_cap_ms")]
    pub throttled_cap_ms: u64,

    /// Symmetric jitter ratio applied to failure delays, 0.0 to 1.0
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
}

const fn default_permanent_forbidden_backoff_ms() -> u64 {
    30 * 60 * 1000
}

const fn default_throttled_base_ms() -> u64 {
    30_000
}

const fn default_throttled_multiplier() -> f64 {
    2.0
}

const fn default_throttled_cap_ms() -> u64 {
    10 * 60 * 1000
}

const fn default_jitter_ratio() -> f64 {
    0.1
}

impl Default for FailureBackoffConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_immediate_retries: 0,
            permanent_forbidden_backoff_ms: default_permanent_forbidden_backoff_ms(),
            throttled_base_ms: default_throttled_base_ms(),
            throttled_multiplier: default_throttled_multiplier(),
            throttled_cap_ms: default_throttled_cap_ms(),
            jitter_ratio: default_jitter_ratio(),
        }
    }
}

impl FailureBackoffConfig {
    /// The backoff policy, or `None` when class-based backoff is disabled.
    pub fn policy(&self) -> Option<FailureBackoff> {
        self.enabled.then(|| FailureBackoff {
            max_immediate_retries: self.max_immediate_retries,
            permanent_forbidden: Duration::from_millis(self.permanent_forbidden_backoff_ms),
            throttled_base: Duration::from_millis(self.throttled_base_ms),
            throttled_multiplier: self.throttled_multiplier,
            throttled_cap: Duration::from_millis(self.throttled_cap_ms),
            jitter_ratio: self.jitter_ratio,
        })
    }
}

/// Agent lease configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LeaseConfig {
    /// Lease lifetime without renewal, in milliseconds
    #[serde(default = "default_lease_ttl_ms")]
    pub ttl_ms: u64,

    /// Renewal (heartbeat) period while an execution runs, in milliseconds
    #[serde(default = "default_lease_renewal_interval_ms")]
    pub renewal_interval_ms: u64,
}

const fn default_lease_ttl_ms() -> u64 {
    30_000
}

const fn default_lease_renewal_interval_ms() -> u64 {
    10_000
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_lease_ttl_ms(),
            renewal_interval_ms: default_lease_renewal_interval_ms(),
        }
    }
}

impl LeaseConfig {
    /// Lease lifetime without renewal.
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn renewal_interval(&self) -> Duration {
        Duration::from_millis(self.renewal_interval_ms)
    }
}

/// What an agent is hashed on when distributing agents across the fleet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardingKey {
    /// The full agent type.
    #[default]
    AgentType,
    /// The account, so one node caches a whole account.
    Account,
    /// Account and region.
    AccountRegion,
}

/// Fleet membership and sharding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ShardingConfig {
    /// Enable sharding across live members
    #[serde(default)]
    pub enabled: bool,

    /// Sharding key
    #[serde(default)]
    pub key: ShardingKey,

    /// Membership heartbeat period, in milliseconds
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Membership record lifetime without heartbeat, in milliseconds
    #[serde(default = "default_member_ttl_ms")]
    pub member_ttl_ms: u64,
}

const fn default_heartbeat_interval_ms() -> u64 {
    5_000
}

const fn default_member_ttl_ms() -> u64 {
    15_000
}

impl Default for ShardingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            key: ShardingKey::default(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            member_ttl_ms: default_member_ttl_ms(),
        }
    }
}

impl ShardingConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn member_ttl(&self) -> Duration {
        Duration::from_millis(self.member_ttl_ms)
    }
}

/// Cache store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// Items per merge batch
    #[serde(default = "default_batch_size")]
    pub max_merge_batch_size: usize,

    /// Ids per eviction batch
    #[serde(default = "default_batch_size")]
    pub max_evict_batch_size: usize,

    /// Skip writes whose content digest is unchanged
    #[serde(default = "default_true")]
    pub hashing_enabled: bool,
}

const fn default_batch_size() -> usize {
    500
}

const fn default_true() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_merge_batch_size: default_batch_size(),
            max_evict_batch_size: default_batch_size(),
            hashing_enabled: true,
        }
    }
}

/// Per-provider cache behaviour
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProviderCacheConfig {
    /// Allow an empty authoritative result to evict every entry the agent owned
    #[serde(default)]
    pub supports_full_eviction: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            retention_days: default_retention_days(),
        }
    }
}
