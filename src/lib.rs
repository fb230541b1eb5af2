//! Bounded, resumable single-site crawler.
//!
//! Walks a site's link graph from a seed, extracts a record from every page
//! matching the video-path marker, classifies it against the pre-cutoff
//! Japanese-title rule, and persists both dedup state and records so a
//! long crawl survives restarts.

pub mod auth;
pub mod config;
pub mod crawl_engine;
pub mod metrics;
pub mod model;
pub mod storage;

pub use config::CrawlConfig;
pub use crawl_engine::Crawler;
pub use metrics::{CrawlMetrics, NoopMetrics};
pub use model::Video;
pub use storage::{
    DedupStore, OverflowStore, RecordStore, RedisDedup, RedisOverflow, SqliteRecords, StoreError,
};
