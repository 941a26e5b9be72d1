//! Structured cache keys.
//!
//! Ids follow the `provider:namespace:part:part...` convention used across
//! providers, e.g. `aws:instances:prod:us-east-1:i-0abc`.

use std::fmt;

const SEPARATOR: char = ':';

/// Helper for building and parsing structured keys.
pub struct Keys;

/// A key split back into its components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub provider: String,
    pub namespace: String,
    /// Remaining segments, such as account, region and resource name.
    pub parts: Vec<String>,
}

impl Keys {
    /// Build a key. Separators inside parts are replaced with `_` so that the
    /// key always parses back into the same number of parts.
    pub fn build(provider: &str, namespace: &str, parts: &[&str]) -> String {
        let mut key = String::with_capacity(
            provider.len() + namespace.len() + parts.iter().map(|p| p.len() + 1).sum::<usize>() + 1,
        );
        key.push_str(&sanitize(provider));
        key.push(SEPARATOR);
        key.push_str(&sanitize(namespace));
        for part in parts {
            key.push(SEPARATOR);
            key.push_str(&sanitize(part));
        }
        key
    }

    /// Split a key built by [`Keys::build`]. `None` when provider or namespace is missing.
    pub fn parse(key: &str) -> Option<ParsedKey> {
        let mut pieces = key.split(SEPARATOR);
        let provider = pieces.next().filter(|p| !p.is_empty())?;
        let namespace = pieces.next().filter(|n| !n.is_empty())?;
        Some(ParsedKey {
            provider: provider.to_string(),
            namespace: namespace.to_string(),
            parts: pieces.map(str::to_string).collect(),
        })
    }
}

fn sanitize(part: &str) -> String {
    part.replace(SEPARATOR, "_")
}

impl fmt::Display for ParsedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.provider, self.namespace)?;
        for part in &self.parts {
            write!(f, "{SEPARATOR}{part}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_parse() {
        let key = Keys::build("aws", "instances", &["prod", "us-east-1", "i-123"]);
        assert_eq!(key, "aws:instances:prod:us-east-1:i-123");

        let parsed = Keys::parse(&key).unwrap();
        assert_eq!(parsed.provider, "aws");
        assert_eq!(parsed.namespace, "instances");
        assert_eq!(parsed.parts, vec!["prod", "us-east-1", "i-123"]);
        assert_eq!(parsed.to_string(), key);
    }

    #[test]
    fn test_separator_in_part_is_sanitized() {
        let key = Keys::build("k8s", "pods", &["ns:default", "web"]);
        assert_eq!(key, "k8s:pods:ns_default:web");
        assert_eq!(Keys::parse(&key).unwrap().parts.len(), 2);
    }

    #[test]
    fn test_parse_rejects_incomplete_keys() {
        assert!(Keys::parse("").is_none());
        assert!(Keys::parse("aws").is_none());
        assert!(Keys::parse(":instances").is_none());
    }
}
