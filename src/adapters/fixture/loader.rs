//! Fixture provider loader from YAML files

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::agent::FixtureCachingAgent;
use super::template::FixtureTemplate;
use crate::domain::models::ProviderCacheConfig;
use crate::domain::ports::{Agent, Provider};
use crate::services::default_provider::DefaultProvider;

/// Built-in demo inventory used when no fixture file is given.
pub const DEMO_FIXTURE: &str = include_str!("../../../fixtures/demo.yaml");

/// Builds providers from YAML fixtures.
pub struct FixtureLoader;

impl FixtureLoader {
    /// Load providers from a YAML fixture file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<Arc<dyn Provider>>> {
        let path = path.as_ref();
        debug!("Loading fixture from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture file: {}", path.display()))?;

        Self::load_from_yaml(&content)
            .with_context(|| format!("Invalid fixture file: {}", path.display()))
    }

    /// Load providers from a YAML string
    pub fn load_from_yaml(yaml: &str) -> Result<Vec<Arc<dyn Provider>>> {
        Ok(Self::into_providers(Self::parse(yaml)?))
    }

    /// Parse and validate a fixture document without building providers.
    pub fn parse(yaml: &str) -> Result<FixtureTemplate> {
        let template: FixtureTemplate =
            serde_yaml::from_str(yaml).context("Failed to parse fixture YAML")?;
        Self::validate(&template)?;
        Ok(template)
    }

    /// One `DefaultProvider` per provider template, each agent a `FixtureCachingAgent`.
    pub fn into_providers(template: FixtureTemplate) -> Vec<Arc<dyn Provider>> {
        let providers: Vec<Arc<dyn Provider>> = template
            .providers
            .into_iter()
            .map(|provider| {
                let agents: Vec<Arc<dyn Agent>> = provider
                    .agents
                    .into_iter()
                    .map(|agent| {
                        Arc::new(FixtureCachingAgent::new(provider.name.clone(), agent))
                            as Arc<dyn Agent>
                    })
                    .collect();
                Arc::new(
                    DefaultProvider::new(provider.name, agents).with_cache_configuration(
                        ProviderCacheConfig {
                            supports_full_eviction: provider.supports_full_eviction,
                        },
                    ),
                ) as Arc<dyn Provider>
            })
            .collect();

        info!(providers = providers.len(), "Fixture providers loaded");
        providers
    }

    /// The built-in demo inventory
    pub fn demo() -> Result<Vec<Arc<dyn Provider>>> {
        Self::load_from_yaml(DEMO_FIXTURE)
    }

    fn validate(template: &FixtureTemplate) -> Result<()> {
        for provider in &template.providers {
            if provider.name.trim().is_empty() {
                bail!("Provider name cannot be empty");
            }
            for agent in &provider.agents {
                if agent.data_types.is_empty() {
                    bail!(
                        "Agent {} of provider {} declares no data types",
                        agent.name,
                        provider.name
                    );
                }
                if agent.data_types.iter().any(|t| t.type_name.trim().is_empty()) {
                    bail!("Agent {} has a data type with an empty name", agent.name);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_fixture_loads() {
        let providers = FixtureLoader::demo().unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].provider_name(), "aws");

        let agent_types: Vec<String> = providers[0]
            .agents()
            .iter()
            .map(|a| a.agent_type().to_string())
            .collect();
        assert_eq!(
            agent_types,
            vec![
                "aws/us-east-1/Instances",
                "aws/us-east-1/LoadBalancers",
                "prod/eu-west-1/Instances"
            ]
        );
    }

    #[test]
    fn test_provider_cache_configuration_is_carried() {
        let yaml = r"
providers:
  - name: gce
    supports_full_eviction: true
    agents: []
";
        let providers = FixtureLoader::load_from_yaml(yaml).unwrap();
        assert!(providers[0].cache_configuration().supports_full_eviction);
    }

    #[test]
    fn test_agent_without_data_types_is_rejected() {
        let yaml = r"
providers:
  - name: aws
    agents:
      - account: prod
        name: Instances
        data_types: []
";
        let Err(err) = FixtureLoader::load_from_yaml(yaml) else {
            panic!("agent without data types was accepted");
        };
        assert!(err.to_string().contains("declares no data types"));
    }

    #[test]
    fn test_demo_namespaces() {
        let template = FixtureLoader::parse(DEMO_FIXTURE).unwrap();
        let namespaces: Vec<String> = template.namespaces().into_iter().collect();
        assert_eq!(namespaces, vec!["instances", "loadBalancers", "serverGroups"]);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let Err(err) = FixtureLoader::load_from_file("/nonexistent/fixture.yaml") else {
            panic!("missing fixture file was loaded");
        };
        assert!(err.to_string().contains("/nonexistent/fixture.yaml"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.yaml");
        std::fs::write(&path, DEMO_FIXTURE).unwrap();
        assert_eq!(FixtureLoader::load_from_file(&path).unwrap().len(), 1);
    }
}
