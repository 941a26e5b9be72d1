use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use cats::adapters::memory::InMemoryCache;
use cats::domain::models::{CacheConfig, CacheData, CacheResult, ProviderCacheConfig};
use cats::domain::ports::WriteableCache;
use cats::services::ProviderCache;

fn instances(count: usize, state: &str) -> Vec<CacheData> {
    (0..count)
        .map(|i| {
            CacheData::new(format!("aws:instances:prod:us-east-1:i-{i:06}"))
                .with_attribute("state", state)
                .with_attribute("instance_type", "m5.large")
                .with_relationship("serverGroups", [format!("aws:serverGroups:prod:us-east-1:sg-{}", i % 20)])
        })
        .collect()
}

fn bench_merge_all(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("merge_all");

    for size in [100, 1_000, 10_000] {
        let items = instances(size, "running");
        group.bench_with_input(BenchmarkId::new("fresh", size), &items, |b, items| {
            b.to_async(&runtime).iter(|| async move {
                let cache = InMemoryCache::new("aws", CacheConfig::default());
                cache.merge_all("instances", black_box(items.clone())).await.unwrap();
            });
        });

        let unchanged = InMemoryCache::new("aws", CacheConfig::default());
        runtime.block_on(unchanged.merge_all("instances", items.clone())).unwrap();
        let unchanged = &unchanged;
        group.bench_with_input(BenchmarkId::new("unchanged", size), &items, |b, items| {
            b.to_async(&runtime).iter(|| async move {
                unchanged.merge_all("instances", black_box(items.clone())).await.unwrap();
            });
        });
    }
    group.finish();
}

fn bench_put_cache_result(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let authoritative = vec!["instances".to_string()];
    let full = instances(5_000, "running");
    let shrunk: Vec<CacheData> = full.iter().take(4_500).cloned().collect();
    let (authoritative, full, shrunk) = (&authoritative, &full, &shrunk);

    c.bench_function("put_cache_result_with_evictions", |b| {
        b.to_async(&runtime).iter(|| async move {
            let backing = Arc::new(InMemoryCache::new("aws", CacheConfig::default()));
            let cache = ProviderCache::new("aws", backing, ProviderCacheConfig::default());
            cache
                .put_cache_result(
                    "aws/us-east-1/Instances",
                    authoritative,
                    CacheResult::new().with_items("instances", full.clone()),
                )
                .await
                .unwrap();
            let summary = cache
                .put_cache_result(
                    "aws/us-east-1/Instances",
                    authoritative,
                    CacheResult::new().with_items("instances", shrunk.clone()),
                )
                .await
                .unwrap();
            black_box(summary.evicted());
        });
    });
}

criterion_group!(benches, bench_merge_all, bench_put_cache_result);
criterion_main!(benches);
