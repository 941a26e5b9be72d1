//! `cats run`: run one node against fixture providers.

use anyhow::{Context, Result};
use clap::Args;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::adapters::fixture::{FixtureLoader, DEMO_FIXTURE};
use crate::application::CatsModule;
use crate::cli::output::{output, RunSummary};
use crate::domain::models::Config;
use crate::domain::ports::Cache;

/// Arguments of `cats run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Fixture file describing providers and agents (defaults to the built-in demo)
    #[arg(short, long)]
    pub fixture: Option<PathBuf>,

    /// Stop after this many seconds (0 runs until Ctrl-C)
    #[arg(short, long, default_value = "30")]
    pub duration_secs: u64,
}

/// Start a node and run until Ctrl-C or the configured duration.
pub async fn execute(args: RunArgs, config: Config, json_mode: bool) -> Result<()> {
    let fixture = match &args.fixture {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture file: {}", path.display()))?,
        None => DEMO_FIXTURE.to_string(),
    };
    let template = FixtureLoader::parse(&fixture)?;
    let namespaces = template.namespaces();

    let module = CatsModule::builder()
        .config(config)
        .providers(FixtureLoader::into_providers(template))
        .build()
        .context("Failed to assemble CATS node")?;
    let report = module.start().await.context("Failed to start CATS node")?;

    wait(args.duration_secs).await;

    let agents = module.scheduler().snapshot().await;
    let cache = module.cache();
    let mut counts = BTreeMap::new();
    for namespace in namespaces {
        let ids = cache.get_identifiers(&namespace).await?;
        counts.insert(namespace, ids.len());
    }
    module.shutdown().await;

    let summary = RunSummary {
        node_id: module.node().id().to_string(),
        scheduler: format!("{:?}", module.config().scheduler.kind).to_lowercase(),
        scheduled: report.scheduled,
        failed_to_bind: report.failed,
        agents,
        metrics: module.metrics().snapshot(),
        namespaces: counts,
    };
    output(&summary, json_mode);
    Ok(())
}

async fn wait(duration_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    if duration_secs == 0 {
        ctrl_c.await;
        info!("Interrupted, shutting down");
        return;
    }

    tokio::select! {
        () = tokio::time::sleep(Duration::from_secs(duration_secs)) => {
            info!(duration_secs, "Run duration elapsed, shutting down");
        }
        () = ctrl_c => info!("Interrupted, shutting down"),
    }
}
