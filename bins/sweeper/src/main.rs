//! Tally report cache sweeper
//!
//! Periodically deletes expired report cache entries until interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally_core::reports::ReportCacheStore;
use tally_db::{ReportCacheRepository, connect_with_config};
use tally_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally_core=info,tally_db=info,tally_sweeper=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = connect_with_config(&config.database).await?;
    info!("Connected to database");

    let repo = Arc::new(ReportCacheRepository::new(db));
    let store = Arc::new(ReportCacheStore::from_config(repo, &config.cache));

    let interval = Duration::from_secs(config.cache.sweep_interval_secs.max(1));
    info!(
        interval_secs = interval.as_secs(),
        default_ttl_secs = config.cache.default_ttl_secs,
        "Report cache sweeper started"
    );
    let sweeper = store.spawn_sweeper(interval);

    tokio::signal::ctrl_c().await?;
    sweeper.abort();
    info!("Report cache sweeper stopped");

    Ok(())
}
