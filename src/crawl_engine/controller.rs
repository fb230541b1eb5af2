//! Crawl orchestration: resume, run to completion, save, reset.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use tokio::sync::watch;

use super::frontier::Frontier;
use super::rate_limiter::RateLimiter;
use crate::config::CrawlConfig;
use crate::metrics::CrawlMetrics;
use crate::model::Video;
use crate::storage::{DedupStore, OverflowStore, RecordStore};

/// Counters and target list shared across workers.
///
/// Guarded by one lock with short critical sections; store I/O never happens
/// while it is held.
#[derive(Debug, Default)]
pub(crate) struct CrawlState {
    pub visited: usize,
    pub targets: Vec<Video>,
}

/// Owns the frontier, the stores, and the worker pool for one crawl.
pub struct Crawler<D, R, O> {
    pub(crate) cfg: CrawlConfig,
    pub(crate) http: reqwest::Client,
    pub(crate) dedup: D,
    pub(crate) records: R,
    pub(crate) frontier: Frontier<O>,
    pub(crate) state: Mutex<CrawlState>,
    pub(crate) errors: AtomicU64,
    /// Visited-count cap for the current run; 0 means unbounded.
    pub(crate) limit: AtomicUsize,
    pub(crate) metrics: Arc<dyn CrawlMetrics>,
}

impl<D: DedupStore, R: RecordStore, O: OverflowStore> Crawler<D, R, O> {
    #[must_use]
    pub fn new(
        cfg: CrawlConfig,
        http: reqwest::Client,
        dedup: D,
        records: R,
        overflow: O,
        metrics: Arc<dyn CrawlMetrics>,
    ) -> Self {
        let frontier = Frontier::new(cfg.frontier_capacity, overflow);
        Self {
            cfg,
            http,
            dedup,
            records,
            frontier,
            state: Mutex::new(CrawlState::default()),
            errors: AtomicU64::new(0),
            limit: AtomicUsize::new(0),
            metrics,
        }
    }

    /// Pages recognized as videos and processed so far.
    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.state.lock().visited
    }

    /// Videos that passed classification so far.
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.state.lock().targets.len()
    }

    /// Fetches abandoned after exhausting their retries.
    #[must_use]
    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Rehydrate counters and dedup claims from the record store.
    ///
    /// Every stored URL is re-claimed best-effort so it is not re-fetched
    /// after a restart. Persisted `is_target` is trusted as-is; records are
    /// not re-classified against the current cutoff. A scan failure is
    /// logged and resume proceeds with empty state.
    pub async fn resume(&self) {
        let videos = match self.records.find_all().await {
            Ok(videos) => videos,
            Err(e) => {
                error!(target: "crawler", "resume failed: {e}");
                return;
            }
        };

        for video in &videos {
            if let Err(e) = self.dedup.claim(&video.url).await {
                debug!(target: "crawler", "re-claim failed for {}: {e}", video.url);
            }
        }

        let (visited, targets) = {
            let mut state = self.state.lock();
            state.visited = videos.len();
            state
                .targets
                .extend(videos.into_iter().filter(|v| v.is_target));
            (state.visited, state.targets.len())
        };
        info!(target: "crawler", "resumed {visited} videos, {targets} targets");
    }

    /// Crawl from `seed` until the pending-work counter returns to zero.
    ///
    /// With a `limit`, fetching short-circuits once that many videos have
    /// been visited; queued and overflowed work still drains out so the
    /// counter reaches zero and the call returns.
    pub async fn run(self: Arc<Self>, seed: &str, limit: Option<usize>) {
        self.limit.store(limit.unwrap_or(0), Ordering::Relaxed);

        let recovered = self.frontier.reconcile_overflow().await;
        if recovered > 0 {
            info!(target: "crawler", "re-admitted {recovered} overflow entries from a previous run");
        }

        let (cancel, shutdown) = watch::channel(false);

        let drain = tokio::spawn({
            let crawler = Arc::clone(&self);
            let shutdown = shutdown.clone();
            async move { crawler.frontier.run_drain(shutdown).await }
        });

        let mut workers = Vec::with_capacity(self.cfg.workers);
        for worker_id in 0..self.cfg.workers.max(1) {
            workers.push(tokio::spawn(worker_loop(
                Arc::clone(&self),
                shutdown.clone(),
                worker_id,
            )));
        }

        self.frontier.offer(seed.to_string()).await;
        self.frontier.pending().wait_idle().await;

        // Stop the drain loop before closing up so nothing re-feeds the
        // queue, then wake idle workers.
        let _ = cancel.send(true);
        if let Err(e) = drain.await {
            error!(target: "crawler", "drain task failed: {e}");
        }
        for worker in workers {
            if let Err(e) = worker.await {
                error!(target: "crawler", "worker task failed: {e}");
            }
        }

        info!(
            target: "crawler",
            "crawl finished: {} videos, {} targets, {} fetch errors",
            self.visited_count(),
            self.target_count(),
            self.error_count()
        );
    }

    /// Write all stored targets as a pretty-printed JSON array.
    ///
    /// Reads back from the record store, not the in-memory list; the store
    /// is the authority for export.
    pub async fn save(&self) -> Result<()> {
        let targets = self.records.find_targets().await.context("reading targets")?;

        let file = File::create(&self.cfg.output_file)
            .with_context(|| format!("creating {}", self.cfg.output_file.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &targets).context("serializing targets")?;
        writer.flush().context("flushing output file")?;

        info!(
            target: "crawler",
            "saved {} targets to {}",
            targets.len(),
            self.cfg.output_file.display()
        );
        Ok(())
    }

    /// Destructive full reset: drop all records and all dedup claims.
    pub async fn clear(&self) -> Result<()> {
        self.records.clear().await.context("clearing record store")?;
        self.dedup.flush().await.context("flushing dedup claims")?;
        warn!(target: "crawler", "cleared record store and dedup claims");
        Ok(())
    }
}

/// One worker: pull, process, resolve, until the frontier shuts down.
async fn worker_loop<D: DedupStore, R: RecordStore, O: OverflowStore>(
    crawler: Arc<Crawler<D, R, O>>,
    mut shutdown: watch::Receiver<bool>,
    worker_id: usize,
) {
    let mut limiter = RateLimiter::new(crawler.cfg.rate_limit());
    while let Some(url) = crawler.frontier.take(&mut shutdown).await {
        crawler.metrics.queue_depth(crawler.frontier.depth());
        crawler.process_url(&url, &mut limiter).await;
        // The one decrement matching this URL's accept, whatever its fate.
        crawler.frontier.pending().decr();
    }
    debug!(target: "crawler::worker", "worker {worker_id} exiting");
}
