//! Fixture-driven demo provider.
//!
//! Stands in for cloud SDK clients: each agent replays a list of canned
//! provider responses, one per run, repeating the last.

pub mod agent;
pub mod loader;
pub mod template;

pub use agent::FixtureCachingAgent;
pub use loader::{FixtureLoader, DEMO_FIXTURE};
pub use template::{AgentTemplate, CycleTemplate, FixtureTemplate, ProviderTemplate, ResourceTemplate};
