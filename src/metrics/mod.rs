//! Metrics seam for the crawl engine.
//!
//! The engine reports counters through this trait; wiring them to an actual
//! observability sink is the embedding process's concern. `NoopMetrics` is
//! always a valid implementation.

use std::time::Duration;

/// Counters and gauges emitted while crawling.
///
/// Implementations must be cheap: these are called from worker hot paths.
pub trait CrawlMetrics: Send + Sync {
    /// A page was fetched and parsed.
    fn page_processed(&self);

    /// A video page was recognized and recorded.
    fn video_found(&self);

    /// A video passed classification.
    fn target_found(&self);

    /// A fetch exhausted its retries.
    fn fetch_error(&self);

    /// Current depth of the in-memory frontier queue.
    fn queue_depth(&self, depth: usize);

    /// Wall time of one GET attempt, success or not.
    fn fetch_duration(&self, elapsed: Duration);
}

/// Metrics sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl CrawlMetrics for NoopMetrics {
    #[inline(always)]
    fn page_processed(&self) {}

    #[inline(always)]
    fn video_found(&self) {}

    #[inline(always)]
    fn target_found(&self) {}

    #[inline(always)]
    fn fetch_error(&self) {}

    #[inline(always)]
    fn queue_depth(&self, _depth: usize) {}

    #[inline(always)]
    fn fetch_duration(&self, _elapsed: Duration) {}
}
