//! Crawl configuration.
//!
//! Defaults mirror the production deployment; any field can be overridden
//! through an optional `crawler.toml` next to the binary or through
//! `CRAWLER_*` environment variables.

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration consumed by the crawl engine and its store adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Number of concurrent worker tasks.
    pub workers: usize,
    /// Capacity of the in-memory frontier queue; links beyond this spill
    /// into the durable overflow list.
    pub frontier_capacity: usize,
    /// Page cap applied in test mode.
    pub max_videos: usize,
    pub base_url: String,
    /// Seed used by the bounded test mode.
    pub test_url: String,
    /// Path marker identifying video pages, e.g. `/watch?v=`.
    pub video_pattern: String,
    /// Site suffix stripped off page titles.
    pub title_suffix: String,
    pub output_file: PathBuf,
    /// Seconds between requests, per worker.
    pub rate_limit_secs: u64,
    /// Videos dated strictly before this instant are classification candidates.
    pub cutoff_date: DateTime<Utc>,

    pub redis_url: String,
    /// Prefix for dedup claim keys.
    pub redis_prefix: String,
    /// Dedup claim TTL in seconds; a URL becomes fetchable again once its
    /// claim expires.
    pub redis_ttl_secs: u64,
    /// Well-known key of the overflow list.
    pub overflow_key: String,

    /// SQLite database holding every crawled video record.
    pub db_path: PathBuf,

    pub login_url: String,
    pub username: String,
    pub password: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            frontier_capacity: 10_000,
            max_videos: 30,
            base_url: "https://www.vidlii.com".to_string(),
            test_url: "https://www.vidlii.com/user/rinkomania".to_string(),
            video_pattern: "/watch?v=".to_string(),
            title_suffix: " - VidLii".to_string(),
            output_file: PathBuf::from("targets.json"),
            rate_limit_secs: 2,
            cutoff_date: Utc.with_ymd_and_hms(2021, 12, 31, 23, 59, 59).unwrap(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            redis_prefix: "vidlii:".to_string(),
            redis_ttl_secs: 24 * 60 * 60,
            overflow_key: "vidlii:overflow".to_string(),
            db_path: PathBuf::from("videos.sqlite"),
            login_url: "https://www.vidlii.com/login".to_string(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl CrawlConfig {
    /// Load configuration from `crawler.toml` (if present) and `CRAWLER_*`
    /// environment variables, falling back to defaults.
    pub fn load() -> Result<Self> {
        config::Config::builder()
            .add_source(config::File::with_name("crawler").required(false))
            .add_source(config::Environment::with_prefix("CRAWLER").try_parsing(true))
            .build()
            .context("building configuration")?
            .try_deserialize()
            .context("deserializing configuration")
    }

    #[must_use]
    pub fn rate_limit(&self) -> Duration {
        Duration::from_secs(self.rate_limit_secs)
    }

    #[must_use]
    pub fn redis_ttl(&self) -> Duration {
        Duration::from_secs(self.redis_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment() {
        let cfg = CrawlConfig::default();
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.frontier_capacity, 10_000);
        assert_eq!(cfg.video_pattern, "/watch?v=");
        assert_eq!(cfg.redis_ttl(), Duration::from_secs(86_400));
        assert!(cfg.base_url.starts_with("https://"));
    }

    #[test]
    fn default_cutoff_is_end_of_2021() {
        let cfg = CrawlConfig::default();
        assert_eq!(cfg.cutoff_date.to_rfc3339(), "2021-12-31T23:59:59+00:00");
    }
}
