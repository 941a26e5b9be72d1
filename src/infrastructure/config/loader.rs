//! Layered configuration loading and validation.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::application::scheduler::AgentTypeFilter;
use crate::domain::errors::DomainError;
use crate::domain::models::config::Config;

/// Directory holding project-local configuration.
pub const CONFIG_DIR: &str = ".cats";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid pool_size: {0}. Must be at least 1")]
    InvalidPoolSize(usize),

    #[error("Invalid queue_capacity: {0}. Must be at least 1")]
    InvalidQueueCapacity(usize),

    #[error("Invalid max_concurrent_agents: {0}. Must be at least 1")]
    InvalidMaxConcurrentAgents(usize),

    #[error("Invalid max_executions_per_second: {0}. Must be positive")]
    InvalidRateLimit(u32),

    /// A duration setting is zero.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error(
        "Invalid lease configuration: renewal_interval_ms ({0}) must be less than ttl_ms ({1})"
    )]
    /// Leases would expire before they are renewed.
    InvalidLeaseTiming(u64, u64),

    #[error(
        "Invalid sharding configuration: heartbeat_interval_ms ({0}) must be less than member_ttl_ms ({1})"
    )]
    /// Members would drop out between heartbeats.
    InvalidHeartbeat(u64, u64),

    /// Agent type pattern does not compile.
    #[error("Invalid agent type pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Failure backoff settings out of range.
    #[error("Invalid agent.failure_backoff: {0}")]
    InvalidFailureBackoff(&'static str),

    #[error("Invalid {0}: must be at least 1")]
    InvalidBatchSize(&'static str),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// Figment could not extract the configuration.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .cats/config.yaml (node config)
    /// 3. .cats/local.yaml (local overrides, optional)
    /// 4. Environment variables (CATS_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Same as [`ConfigLoader::load`], resolving `.cats/` under `dir`.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Config> {
        let config_dir = dir.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(config_dir.join("config.yaml")))
            .merge(Yaml::file(config_dir.join("local.yaml")))
            .merge(Env::prefixed("CATS_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let scheduler = &config.scheduler;
        if scheduler.pool_size == 0 {
            return Err(ConfigError::InvalidPoolSize(scheduler.pool_size));
        }
        if scheduler.queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity(scheduler.queue_capacity));
        }
        if scheduler.max_concurrent_agents == 0 {
            return Err(ConfigError::InvalidMaxConcurrentAgents(
                scheduler.max_concurrent_agents,
            ));
        }
        if scheduler.max_executions_per_second == Some(0) {
            return Err(ConfigError::InvalidRateLimit(0));
        }
        if scheduler.lock_acquisition_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("scheduler.lock_acquisition_interval_ms"));
        }

        AgentTypeFilter::from_config(scheduler).map_err(|e| match e {
            DomainError::InvalidPattern { pattern, message } => {
                ConfigError::InvalidPattern { pattern, message }
            }
            other => ConfigError::ValidationFailed(other.to_string()),
        })?;

        let durations = [
            ("agent.interval_ms", config.agent.interval_ms),
            ("agent.error_interval_ms", config.agent.error_interval_ms),
            ("agent.timeout_ms", config.agent.timeout_ms),
            ("lease.ttl_ms", config.lease.ttl_ms),
            ("lease.renewal_interval_ms", config.lease.renewal_interval_ms),
            ("sharding.heartbeat_interval_ms", config.sharding.heartbeat_interval_ms),
            ("sharding.member_ttl_ms", config.sharding.member_ttl_ms),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::ZeroDuration(*name));
        }

        if config.lease.renewal_interval_ms >= config.lease.ttl_ms {
            return Err(ConfigError::InvalidLeaseTiming(
                config.lease.renewal_interval_ms,
                config.lease.ttl_ms,
            ));
        }
        if config.sharding.heartbeat_interval_ms >= config.sharding.member_ttl_ms {
            return Err(ConfigError::InvalidHeartbeat(
                config.sharding.heartbeat_interval_ms,
                config.sharding.member_ttl_ms,
            ));
        }

        let backoff = &config.agent.failure_backoff;
        if !(0.0..=1.0).contains(&backoff.jitter_ratio) {
            return Err(ConfigError::InvalidFailureBackoff(
                "jitter_ratio must be between 0.0 and 1.0",
            ));
        }
        if !backoff.throttled_multiplier.is_finite() || backoff.throttled_multiplier < 1.0 {
            return Err(ConfigError::InvalidFailureBackoff(
                "throttled_multiplier must be at least 1.0",
            ));
        }
        if backoff.throttled_base_ms > backoff.throttled_cap_ms {
            return Err(ConfigError::InvalidFailureBackoff(
                "throttled_base_ms must not exceed throttled_cap_ms",
            ));
        }

        if config.cache.max_merge_batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize("cache.max_merge_batch_size"));
        }
        if config.cache.max_evict_batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize("cache.max_evict_batch_size"));
        }

        if config
            .node
            .identity
            .as_deref()
            .is_some_and(|identity| identity.trim().is_empty())
        {
            return Err(ConfigError::ValidationFailed(
                "node.identity cannot be blank".to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}
