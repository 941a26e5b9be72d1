//! Registry assembly, binding and the composite read view across providers.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cats::adapters::memory::InMemoryNamedCacheFactory;
use cats::domain::models::{AgentDataType, CacheData, CacheResult, ProviderCacheConfig};
use cats::domain::ports::{Agent, AgentScheduler, Cache, ExecutionInstrumentation, Provider};
use cats::services::{DefaultProvider, MetricsExecutionInstrumentation, ProviderRegistry};
use cats::{AgentController, BindReport};
use common::{default_scheduler, intervals, Behavior, ScriptedAgent};

fn producing(agent_type: &str, provider: &str, namespace: &str, item: CacheData) -> Arc<dyn Agent> {
    ScriptedAgent::new(
        agent_type,
        provider,
        Behavior::Produce(CacheResult::new().with_items(namespace, vec![item])),
    )
    .with_data_types(vec![AgentDataType::authoritative(namespace)])
    .shared()
}

#[tokio::test(start_paused = true)]
async fn test_agent_for_unknown_provider_is_skipped() {
    let agents = vec![
        producing("aws/us-east-1/Instances", "aws", "instances", CacheData::new("i-1")),
        // Writes to a provider the registry does not know.
        producing("gce/us-central1/Instances", "gce", "instances", CacheData::new("g-1")),
    ];
    let provider: Arc<dyn Provider> = Arc::new(DefaultProvider::new("aws", agents));
    let registry = ProviderRegistry::new(vec![provider], &InMemoryNamedCacheFactory::default());
    let scheduler: Arc<dyn AgentScheduler> = default_scheduler(intervals(30_000, 60_000, 5_000));

    let report = AgentController::bind(
        &registry,
        Arc::clone(&scheduler),
        Arc::new(MetricsExecutionInstrumentation::new()) as Arc<dyn ExecutionInstrumentation>,
    )
    .await
    .unwrap();

    assert_eq!(report, BindReport { scheduled: 1, failed: 1 });
    assert_eq!(registry.agent_count(), 2);
    let snapshot = scheduler.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].agent_type, "aws/us-east-1/Instances");
    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_composite_cache_combines_providers() {
    let shared_id = "account:prod";
    let aws: Arc<dyn Provider> = Arc::new(DefaultProvider::new(
        "aws",
        vec![producing(
            "aws/Accounts",
            "aws",
            "accounts",
            CacheData::new(shared_id)
                .with_attribute("cloud", "aws")
                .with_relationship("regions", ["us-east-1"]),
        )],
    ));
    let gce: Arc<dyn Provider> = Arc::new(DefaultProvider::new(
        "gce",
        vec![producing(
            "gce/Accounts",
            "gce",
            "accounts",
            CacheData::new(shared_id)
                .with_attribute("project", "prod-1234")
                .with_relationship("regions", ["us-central1"]),
        )],
    ));
    let registry = ProviderRegistry::new(vec![aws, gce], &InMemoryNamedCacheFactory::default());
    let scheduler: Arc<dyn AgentScheduler> = default_scheduler(intervals(30_000, 60_000, 5_000));
    AgentController::bind(
        &registry,
        Arc::clone(&scheduler),
        Arc::new(MetricsExecutionInstrumentation::new()) as Arc<dyn ExecutionInstrumentation>,
    )
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let aws_only = registry.provider_cache("aws").unwrap();
    assert!(aws_only
        .get("accounts", shared_id)
        .await
        .unwrap()
        .unwrap()
        .attribute("project")
        .is_none());

    let combined = registry.cache().get("accounts", shared_id).await.unwrap().unwrap();
    assert_eq!(combined.attribute("cloud"), Some(&serde_json::json!("aws")));
    assert_eq!(combined.attribute("project"), Some(&serde_json::json!("prod-1234")));
    assert_eq!(
        combined.related("regions").collect::<Vec<_>>(),
        vec!["us-central1", "us-east-1"]
    );
    assert_eq!(registry.cache().get_identifiers("accounts").await.unwrap(), vec![shared_id]);
    scheduler.shutdown().await;
}

#[test]
fn test_cache_overrides_replace_provider_configuration() {
    let provider: Arc<dyn Provider> = Arc::new(DefaultProvider::new("aws", Vec::new()));
    let overrides = HashMap::from([(
        "aws".to_string(),
        ProviderCacheConfig {
            supports_full_eviction: true,
        },
    )]);
    let registry = ProviderRegistry::with_cache_overrides(
        vec![provider],
        &InMemoryNamedCacheFactory::default(),
        &overrides,
    );

    assert!(registry.provider_cache("aws").unwrap().configuration().supports_full_eviction);
    assert!(registry.provider_cache("gce").is_none());
}
