//! Domain errors for the CATS caching engine.

use thiserror::Error;

use super::models::agent_state::AgentState;
use super::models::schedule::FailureClass;

/// Domain-level errors that can occur while caching, storing or scheduling.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The provider SDK call made by an agent failed (network, auth, throttling).
    #[error("Provider call failed for agent {agent_type}: {message}")]
    Provider { agent_type: String, message: String },

    /// The backing cache store rejected a read or write.
    #[error("Cache storage error: {0}")]
    Storage(String),

    /// The execution did not finish within the agent's timeout.
    #[error("Agent {agent_type} timed out after {timeout_ms}ms")]
    ExecutionTimeout { agent_type: String, timeout_ms: u64 },

    /// Namespace empty or reserved.
    #[error("Invalid cache namespace: {0:?}")]
    InvalidNamespace(String),

    /// The agent state machine does not allow this move.
    #[error("Invalid state transition for agent {agent_type} from {from} to {to}")]
    InvalidStateTransition {
        /// Agent whose row was moved.
        agent_type: String,
        /// State before the move.
        from: AgentState,
        /// Requested state.
        to: AgentState,
    },

    /// The registry was already bound to a scheduler by an `AgentController`.
    #[error("Provider registry is already bound to a scheduler")]
    AlreadyBound,

    /// Work was submitted after the pool shut down.
    #[error("Worker pool {0} is closed")]
    PoolClosed(String),

    /// A job running on the worker pool panicked.
    #[error("Execution panicked: {0}")]
    Panicked(String),

    /// The execution was stopped before it finished.
    #[error("Execution cancelled: {0}")]
    Cancelled(String),

    /// Lease store failure, or a lease lost before store.
    #[error("Lease store error: {0}")]
    Lease(String),

    #[error("Agent not scheduled: {0}")]
    AgentNotScheduled(String),

    /// An agent names a provider the registry does not know.
    #[error("No provider cache registered for provider {0}")]
    UnknownProvider(String),

    /// An enabled or disabled agent type pattern does not compile.
    #[error("Invalid identifier pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DomainError {
    /// Build a provider error for the given agent.
    pub fn provider(agent_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            agent_type: agent_type.into(),
            message: message.into(),
        }
    }

    /// Stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Provider { .. } => "provider",
            Self::Storage(_) => "storage",
            Self::ExecutionTimeout { .. } => "timeout",
            Self::InvalidNamespace(_) => "invalid_namespace",
            Self::InvalidStateTransition { .. } => "state_transition",
            Self::AlreadyBound => "already_bound",
            Self::PoolClosed(_) => "pool_closed",
            Self::Panicked(_) => "panic",
            Self::Cancelled(_) => "cancelled",
            Self::Lease(_) => "lease",
            Self::AgentNotScheduled(_) => "not_scheduled",
            Self::UnknownProvider(_) => "unknown_provider",
            Self::InvalidPattern { .. } => "invalid_pattern",
            Self::Serialization(_) => "serialization",
        }
    }
}

impl DomainError {
    /// How the scheduler should back off after this error.
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::Provider { message, .. } => FailureClass::from_message(message),
            Self::ExecutionTimeout { .. }
            | Self::Storage(_)
            | Self::Lease(_)
            | Self::Cancelled(_) => FailureClass::Transient,
            _ => FailureClass::Unknown,
        }
    }
}

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}
