//! Namespaces an agent writes and its authority over them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether an agent owns eviction rights over a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Authority {
    /// Sole source of truth: ids it stops reporting are evicted.
    Authoritative,
    /// Contributes entries but never evicts.
    Informative,
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authoritative => write!(f, "authoritative"),
            Self::Informative => write!(f, "informative"),
        }
    }
}

/// A namespace an agent writes, tagged with its authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentDataType {
    /// Namespace the agent writes.
    pub type_name: String,
    pub authority: Authority,
}

impl AgentDataType {
    /// Data type the agent owns: ids it stops returning are evicted.
    pub fn authoritative(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            authority: Authority::Authoritative,
        }
    }

    /// Data type the agent only contributes to.
    pub fn informative(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            authority: Authority::Informative,
        }
    }

    pub fn is_authoritative(&self) -> bool {
        self.authority == Authority::Authoritative
    }
}

/// Names of the authoritative namespaces among `types`.
pub fn authoritative_types(types: &[AgentDataType]) -> Vec<String> {
    types
        .iter()
        .filter(|t| t.is_authoritative())
        .map(|t| t.type_name.clone())
        .collect()
}
