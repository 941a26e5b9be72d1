//! Per-node ownership state of an agent type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduling state of one agent type, as seen by this node.
///
/// ```text
/// Unscheduled -> OwnedIdle -> OwnedRunning -> OwnedIdle
///                   |              |
///                   +--> Released <+ --> Unscheduled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Registered here but not owned by this node.
    Unscheduled,
    /// Owned by this node, waiting for its next run.
    OwnedIdle,
    /// Owned by this node with an execution in flight.
    OwnedRunning,
    /// Ownership given up (lease lost, unscheduled, or shutting down).
    Released,
}

impl AgentState {
    /// Label used in logs and status output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unscheduled => "unscheduled",
            Self::OwnedIdle => "owned_idle",
            Self::OwnedRunning => "owned_running",
            Self::Released => "released",
        }
    }

    /// Whether the state machine allows moving to `next`.
    pub fn can_transition_to(&self, next: AgentState) -> bool {
        use AgentState::{OwnedIdle, OwnedRunning, Released, Unscheduled};
        matches!(
            (self, next),
            (Unscheduled, OwnedIdle)
                | (OwnedIdle, OwnedRunning)
                | (OwnedRunning, OwnedIdle)
                | (OwnedIdle | OwnedRunning, Released)
                | (Released, Unscheduled)
        )
    }

    /// `OwnedIdle` or `OwnedRunning`.
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::OwnedIdle | Self::OwnedRunning)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(AgentState::Unscheduled.can_transition_to(AgentState::OwnedIdle));
        assert!(AgentState::OwnedIdle.can_transition_to(AgentState::OwnedRunning));
        assert!(AgentState::OwnedRunning.can_transition_to(AgentState::OwnedIdle));
        assert!(AgentState::OwnedRunning.can_transition_to(AgentState::Released));
        assert!(AgentState::Released.can_transition_to(AgentState::Unscheduled));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!AgentState::Unscheduled.can_transition_to(AgentState::OwnedRunning));
        assert!(!AgentState::Released.can_transition_to(AgentState::OwnedRunning));
        assert!(!AgentState::OwnedIdle.can_transition_to(AgentState::Unscheduled));
    }
}
