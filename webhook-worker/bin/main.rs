//! CLI bootstrap: loads configuration, wires the shared cache client and
//! tier policy, spawns one [`DeliveryEngine`] per requested tier, and runs
//! until a shutdown signal arrives.

use std::sync::Arc;

use clap::Parser;
use webhook_broker::ExponentialBackoff;
use webhook_cache::{RedisCacheClient, RollingAverageMaintainer};
use webhook_common::config::{TierConfiguration, WorkerSettings};
use webhook_common::TierPolicy;
use webhook_delivery::DeliveryEngine;
use webhook_metrics::MetricsConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Tiered webhook delivery worker")]
struct Args {
    /// Tiers to run, named by their topic (defaults to every configured
    /// tier, in ranking order). May also be set via the `TIER` env var as
    /// a comma-separated list.
    #[arg(long, value_delimiter = ',', env = "TIER")]
    tier: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if cfg!(debug_assertions) {
        let _ = dotenvy::dotenv();
    }
    webhook_common::logging::init();

    let args = Args::parse();
    let settings = WorkerSettings::from_env()?;

    webhook_metrics::init_metrics(&MetricsConfig {
        enabled: settings.metrics_enabled,
        endpoint: settings.metrics_endpoint.clone(),
    })?;

    let cache_client = Arc::new(RedisCacheClient::connect(&settings.redis_url()).await?);
    let tier_policy = TierPolicy::new(settings.tier_ranking.clone());

    let tiers_to_run = args.tier.unwrap_or_else(|| settings.tier_ranking.clone());
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let mut handles = Vec::with_capacity(tiers_to_run.len());
    for topic in tiers_to_run {
        if !tier_policy.contains(&topic) {
            tracing::warn!(topic, "requested tier is not in RANK_TOPIC, skipping");
            continue;
        }

        let tier_name = topic.trim_end_matches("_topic");
        let prefix = tier_name.to_uppercase();
        let tier_config = TierConfiguration::from_env(&prefix, &topic, &format!("{tier_name}_group"))?;
        let maintainer = RollingAverageMaintainer::new(cache_client.clone(), settings.limits.limit_redis_msg);

        let engine = DeliveryEngine::new(
            &settings.bootstrap_servers,
            &tier_config.group,
            &tier_config.topic,
            settings.webhook_url.clone(),
            settings.limits.status_allow.clone(),
            tier_config.request_timeout,
            settings.limits.limit_msg,
            settings.limits.timeout_msg,
            settings.webhook_tls_verify,
            &settings.log_stash_topic,
            tier_policy.clone(),
            maintainer,
            ExponentialBackoff::default(),
        )?;

        let shutdown_rx = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move { engine.run(shutdown_rx).await }));
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, waiting for in-flight batches to finish");

    let _ = shutdown_tx.send(());
    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
