//! Crawler entry point.
//!
//! Production mode resumes from durable state and crawls the configured base
//! URL to natural completion. `--test` wipes all durable state and crawls
//! the test seed up to a small fixed cap.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};

use lost_media_finder::{
    CrawlConfig, Crawler, NoopMetrics, RedisDedup, RedisOverflow, SqliteRecords, auth,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let test_mode = std::env::args().any(|arg| arg == "--test");
    let cfg = CrawlConfig::load().context("loading configuration")?;

    let dedup = RedisDedup::connect(&cfg.redis_url, &cfg.redis_prefix, cfg.redis_ttl())
        .await
        .context("connecting to redis (dedup)")?;
    let overflow = RedisOverflow::connect(&cfg.redis_url, &cfg.overflow_key)
        .await
        .context("connecting to redis (overflow)")?;
    let records = SqliteRecords::open(&cfg.db_path)
        .await
        .context("opening record store")?;

    let client = auth::new_client()?;
    if let Err(e) = auth::login(&client, &cfg).await {
        warn!("continuing without login: {e:#}");
    }

    let crawler = Arc::new(Crawler::new(
        cfg.clone(),
        client,
        dedup,
        records.clone(),
        overflow,
        Arc::new(NoopMetrics),
    ));

    if test_mode {
        info!("running in test mode");
        crawler.clear().await.context("clearing durable state")?;
        crawler.clone().run(&cfg.test_url, Some(cfg.max_videos)).await;
    } else {
        info!("running in production mode");
        crawler.resume().await;
        crawler.clone().run(&cfg.base_url, None).await;
    }

    if let Err(e) = crawler.save().await {
        error!("saving targets: {e:#}");
    }
    records.close().await;

    println!(
        "visited {} videos, {} targets",
        crawler.visited_count(),
        crawler.target_count()
    );
    Ok(())
}
