//! Durable stores backing the crawl engine.
//!
//! Three narrow seams keep the engine testable without external services:
//! dedup claims (Redis), the record store (SQLite), and the overflow list
//! (Redis). Production adapters live in the submodules; `memory` provides
//! in-process implementations for tests and dry runs.

pub mod dedup;
pub mod memory;
pub mod overflow;
pub mod records;

use std::future::Future;

use thiserror::Error;

use crate::model::Video;

pub use dedup::RedisDedup;
pub use overflow::RedisOverflow;
pub use records::SqliteRecords;

/// Errors surfaced by the store adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Atomic claim-if-absent with expiry.
///
/// A claim succeeds at most once per URL per TTL window; after expiry the
/// URL is fetchable again. Callers must treat transport errors as
/// "not claimed" so a flaky store can never cause a duplicate fetch.
pub trait DedupStore: Send + Sync + 'static {
    /// Claim `url`. Returns `true` only if this call created the claim.
    fn claim(&self, url: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Drop every claim. Full-reset use only.
    fn flush(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Idempotent record persistence keyed by canonical URL.
pub trait RecordStore: Send + Sync + 'static {
    /// Insert or replace the record for `video.url`.
    fn upsert(&self, video: &Video) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Every record ever crawled, targets and non-targets alike.
    fn find_all(&self) -> impl Future<Output = Result<Vec<Video>, StoreError>> + Send;

    /// Only records that passed classification.
    fn find_targets(&self) -> impl Future<Output = Result<Vec<Video>, StoreError>> + Send;

    /// Irreversibly clear the store. Full-reset use only.
    fn clear(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Durable FIFO relief valve for the frontier.
pub trait OverflowStore: Send + Sync + 'static {
    /// Append a URL at the tail.
    fn push(&self, url: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove and return the oldest URL; `None` when empty, never blocking.
    fn pop(&self) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;
}
