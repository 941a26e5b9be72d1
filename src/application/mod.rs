//! Application layer: schedulers, worker pool and agent binding.

pub mod agent_controller;
pub mod cats_module;
pub mod named_thread_factory;
pub mod scheduler;
pub mod worker_pool;

pub use agent_controller::{AgentController, BindReport};
pub use cats_module::{CatsModule, CatsModuleBuilder};
pub use named_thread_factory::NamedThreadFactory;
pub use scheduler::{AgentTypeFilter, ClusteredAgentScheduler, DefaultAgentScheduler};
pub use worker_pool::{WorkerPool, WorkerPoolConfig, WorkerPoolStats};
