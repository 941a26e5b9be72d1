//! Execution instrumentation port.

use std::time::Duration;

use super::agent::Agent;
use crate::domain::errors::DomainError;

/// Side-effect-only hooks invoked around every agent execution.
///
/// Implementations must not fail; callers additionally isolate panics.
pub trait ExecutionInstrumentation: Send + Sync {
    /// Called before the agent loads.
    fn execution_started(&self, agent: &dyn Agent);

    /// Called after the result was stored.
    fn execution_completed(&self, agent: &dyn Agent, elapsed: Duration);

    /// Called when load or store failed, timed out or was cancelled.
    fn execution_failed(&self, agent: &dyn Agent, error: &DomainError, elapsed: Duration);
}
