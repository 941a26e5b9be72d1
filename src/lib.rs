//! CATS - Cloud Asset Tracking System
//!
//! A polling-and-caching engine: caching agents poll cloud accounts and
//! regions per resource type, normalize what they find into keyed
//! [`CacheData`], and merge it into a shared store. A scheduler guarantees
//! that at most one execution of each agent type runs at a time, on a single
//! node or across a fleet sharing a lease store.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): cache model, agent and scheduler ports
//! - **Service Layer** (`services`): provider caches, registry, instrumentation, sharding
//! - **Application Layer** (`application`): schedulers, worker pool, agent binding
//! - **Adapters** (`adapters`): in-memory stores and the fixture provider
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use cats::adapters::fixture::FixtureLoader;
//! use cats::application::CatsModule;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let module = CatsModule::builder()
//!         .providers(FixtureLoader::demo()?)
//!         .build()?;
//!     module.start().await?;
//!     module.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{AgentController, BindReport, CatsModule, CatsModuleBuilder};
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    AgentDataType, AgentState, Authority, CacheData, CacheFilter, CacheResult, Config, Keys,
};
pub use domain::ports::{
    Agent, AgentExecution, AgentScheduler, Cache, CachingAgent, ExecutionInstrumentation,
    NamedCacheFactory, Provider, WriteableCache,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{CompositeCache, ProviderCache, ProviderRegistry};
