//! End-to-end caching cycles: demo fixture providers on a single node.

use std::time::Duration;

use cats::adapters::fixture::FixtureLoader;
use cats::domain::models::{CacheFilter, SchedulerKind};
use cats::domain::ports::Cache;
use cats::{CatsModule, Config};

fn single_node_config() -> Config {
    let mut config = Config::default();
    config.node.identity = Some("node-e2e".into());
    config.scheduler.kind = SchedulerKind::Default;
    config.scheduler.max_initial_jitter_ms = 0;
    config
}

async fn demo_node() -> CatsModule {
    let module = CatsModule::builder()
        .config(single_node_config())
        .providers(FixtureLoader::demo().unwrap())
        .build()
        .unwrap();
    let report = module.start().await.unwrap();
    assert_eq!(report.scheduled, 3);
    assert_eq!(report.failed, 0);
    module
}

#[tokio::test(start_paused = true)]
async fn test_first_cycle_populates_cache_with_agent_keys() {
    let module = demo_node().await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let cache = module.cache();
    let us_east = cache
        .filter_identifiers("instances", "aws:instances:prod:us-east-1:*")
        .await
        .unwrap();
    assert_eq!(
        us_east,
        vec![
            "aws:instances:prod:us-east-1:i-0a1",
            "aws:instances:prod:us-east-1:i-0a2",
            "aws:instances:prod:us-east-1:i-0a3",
        ]
    );
    assert_eq!(cache.get_identifiers("instances").await.unwrap().len(), 4);
    assert_eq!(cache.get_identifiers("serverGroups").await.unwrap().len(), 2);

    let lbs = cache.get_all("loadBalancers").await.unwrap();
    assert_eq!(lbs.len(), 1);
    assert_eq!(lbs[0].id, "aws:loadBalancers:prod:us-east-1:web-lb");
    assert_eq!(
        lbs[0].related("instances").collect::<Vec<_>>(),
        vec![
            "aws:instances:prod:us-east-1:i-0a1",
            "aws:instances:prod:us-east-1:i-0a2"
        ]
    );

    let instance = cache
        .get("instances", "aws:instances:prod:us-east-1:i-0a1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(instance.attribute("state"), Some(&serde_json::json!("running")));
    assert_eq!(
        instance.related("loadBalancers").collect::<Vec<_>>(),
        vec!["aws:loadBalancers:prod:us-east-1:web-lb"]
    );

    module.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_cycle_keeps_entries_and_next_cycle_evicts_stale_ids() {
    let module = demo_node().await;
    let cache = module.cache();
    let pattern = "aws:instances:prod:us-east-1:*";

    // Second cycle of the us-east-1 Instances agent fails.
    tokio::time::sleep(Duration::from_secs(7)).await;
    let metrics = module.metrics().agent("aws/us-east-1/Instances").unwrap();
    assert_eq!(metrics.successes, 1);
    assert_eq!(metrics.failures, 1);
    assert_eq!(metrics.failures_by_kind.get("provider"), Some(&1));
    assert_eq!(cache.filter_identifiers("instances", pattern).await.unwrap().len(), 3);

    // Third cycle reports i-0a2 gone.
    tokio::time::sleep(Duration::from_secs(5)).await;
    let remaining = cache.filter_identifiers("instances", pattern).await.unwrap();
    assert_eq!(
        remaining,
        vec![
            "aws:instances:prod:us-east-1:i-0a1",
            "aws:instances:prod:us-east-1:i-0a3",
        ]
    );
    let i3 = cache
        .get("instances", "aws:instances:prod:us-east-1:i-0a3")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(i3.attribute("state"), Some(&serde_json::json!("running")));

    // Other agents' entries and informative namespaces are untouched.
    assert!(cache
        .get("instances", "aws:instances:prod:eu-west-1:i-0e9")
        .await
        .unwrap()
        .is_some());
    assert_eq!(cache.get_identifiers("serverGroups").await.unwrap().len(), 2);

    module.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_filtered_read_drops_unrequested_relationships() {
    let module = demo_node().await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let filter = CacheFilter::include(["serverGroups"]);
    let instance = module
        .cache()
        .get_filtered("instances", "aws:instances:prod:us-east-1:i-0a1", &filter)
        .await
        .unwrap()
        .unwrap();

    assert!(instance.relationships.contains_key("serverGroups"));
    assert!(!instance.relationships.contains_key("loadBalancers"));
    module.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_reports_every_agent() {
    let module = demo_node().await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let snapshot = module.scheduler().snapshot().await;
    let mut agent_types: Vec<&str> = snapshot.iter().map(|s| s.agent_type.as_str()).collect();
    agent_types.sort_unstable();
    assert_eq!(
        agent_types,
        vec![
            "aws/us-east-1/Instances",
            "aws/us-east-1/LoadBalancers",
            "prod/eu-west-1/Instances"
        ]
    );
    assert!(snapshot.iter().all(|s| s.executions == 1));

    module.shutdown().await;
}
