//! Relationship filters applied on read.

use serde::{Deserialize, Serialize};

/// Restricts which relationship types are materialized on a read.
///
/// Reads without a filter return every relationship type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheFilter {
    /// Relationship name prefixes to keep
    pub relationship_prefixes: Vec<String>,
}

impl CacheFilter {
    /// Keep no relationships at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// Keep relationships whose name starts with any of `prefixes`.
    pub fn include<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            relationship_prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether relationships of this type are kept.
    pub fn allows(&self, relationship: &str) -> bool {
        self.relationship_prefixes
            .iter()
            .any(|prefix| relationship.starts_with(prefix.as_str()))
    }
}
