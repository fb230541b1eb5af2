//! Bounded frontier with durable spillover.
//!
//! Discovered links land in a fixed-capacity in-memory queue. When the queue
//! is full, entries spill into the overflow store and a background drain
//! loop feeds them back as the queue empties, so logical capacity is bounded
//! only by external storage while heap usage stays fixed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, mpsc, watch};

use crate::storage::OverflowStore;

/// How long the drain loop sleeps when the overflow store is empty or down.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Count of URLs accepted but not yet fully resolved.
///
/// Incremented exactly once per accepted URL, decremented exactly once when
/// that URL is processed or definitively dropped. The crawl is complete when
/// the count returns to zero.
#[derive(Debug, Default)]
pub struct PendingWork {
    count: AtomicUsize,
    idle: Notify,
}

impl PendingWork {
    pub fn incr(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    pub fn decr(&self) {
        let prev = self.count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev != 0, "pending-work decrement without matching increment");
        if prev == 1 {
            self.idle.notify_waiters();
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Resolve once the count reaches zero.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// The crawl frontier: a bounded queue plus its overflow relief valve.
pub struct Frontier<O> {
    tx: mpsc::Sender<String>,
    rx: tokio::sync::Mutex<mpsc::Receiver<String>>,
    overflow: O,
    pending: PendingWork,
}

impl<O: OverflowStore> Frontier<O> {
    #[must_use]
    pub fn new(capacity: usize, overflow: O) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            overflow,
            pending: PendingWork::default(),
        }
    }

    #[must_use]
    pub fn pending(&self) -> &PendingWork {
        &self.pending
    }

    /// Entries currently sitting in the in-memory queue.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Accept a URL: count it as pending, then queue it, spilling to the
    /// overflow store when the queue is full. Only if the spill also fails
    /// is the URL dropped and un-counted.
    pub async fn offer(&self, url: String) {
        self.pending.incr();
        match self.tx.try_send(url) {
            Ok(()) => {}
            Err(TrySendError::Full(url)) => {
                if let Err(e) = self.overflow.push(&url).await {
                    warn!(target: "crawler::frontier", "dropping {url}: overflow push failed: {e}");
                    self.pending.decr();
                }
            }
            Err(TrySendError::Closed(_)) => self.pending.decr(),
        }
    }

    /// Pull the next URL, or `None` once the shutdown signal fires.
    pub async fn take(&self, shutdown: &mut watch::Receiver<bool>) -> Option<String> {
        if *shutdown.borrow() {
            return None;
        }
        let mut rx = self.rx.lock().await;
        tokio::select! {
            _ = shutdown.changed() => None,
            url = rx.recv() => url,
        }
    }

    /// Re-admit overflow entries left behind by a previous run.
    ///
    /// Entries durably queued when the process died carry no pending-work
    /// accounting after restart, so they are popped in bulk here and pushed
    /// back through `offer` before workers start. Returns how many were
    /// recovered.
    pub async fn reconcile_overflow(&self) -> usize {
        let mut stale = Vec::new();
        loop {
            match self.overflow.pop().await {
                Ok(Some(url)) => stale.push(url),
                Ok(None) => break,
                Err(e) => {
                    warn!(target: "crawler::frontier", "overflow reconciliation stopped: {e}");
                    break;
                }
            }
        }
        let recovered = stale.len();
        for url in stale {
            self.offer(url).await;
        }
        recovered
    }

    /// Move overflow entries back into the queue until shutdown.
    ///
    /// The blocking `send` cannot deadlock: this loop is the only path
    /// re-feeding overflow, and workers keep draining the queue.
    pub async fn run_drain(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }
            match self.overflow.pop().await {
                Ok(Some(url)) => {
                    tokio::select! {
                        _ = shutdown.changed() => {
                            warn!(target: "crawler::frontier", "dropping overflow entry at shutdown");
                            self.pending.decr();
                            return;
                        }
                        res = self.tx.send(url) => {
                            if res.is_err() {
                                self.pending.decr();
                            }
                        }
                    }
                }
                Ok(None) => self.sleep_or_shutdown(&mut shutdown).await,
                Err(e) => {
                    warn!(target: "crawler::frontier", "overflow pop failed: {e}");
                    self.sleep_or_shutdown(&mut shutdown).await;
                }
            }
        }
    }

    async fn sleep_or_shutdown(&self, shutdown: &mut watch::Receiver<bool>) {
        tokio::select! {
            _ = shutdown.changed() => {}
            _ = tokio::time::sleep(DRAIN_POLL_INTERVAL) => {}
        }
        debug!(target: "crawler::frontier", "drain loop idle, {} pending", self.pending.count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryOverflow;
    use std::sync::Arc;

    fn shutdown_pair() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    #[tokio::test]
    async fn offer_and_take_round_trip() {
        let frontier = Frontier::new(4, MemoryOverflow::new());
        let (_tx, mut shutdown) = shutdown_pair();

        frontier.offer("https://site/a".to_string()).await;
        assert_eq!(frontier.pending().count(), 1);

        let url = frontier.take(&mut shutdown).await;
        assert_eq!(url.as_deref(), Some("https://site/a"));

        frontier.pending().decr();
        assert_eq!(frontier.pending().count(), 0);
    }

    #[tokio::test]
    async fn full_queue_spills_to_overflow() {
        let frontier = Frontier::new(1, MemoryOverflow::new());

        frontier.offer("https://site/a".to_string()).await;
        frontier.offer("https://site/b".to_string()).await;

        assert_eq!(frontier.depth(), 1);
        assert_eq!(frontier.pending().count(), 2);
        assert_eq!(
            frontier.overflow.pop().await.unwrap().as_deref(),
            Some("https://site/b")
        );
    }

    #[tokio::test]
    async fn failed_spill_drops_and_uncounts() {
        let overflow = MemoryOverflow::new();
        overflow.set_failing(true);
        let frontier = Frontier::new(1, overflow);

        frontier.offer("https://site/a".to_string()).await;
        frontier.offer("https://site/b".to_string()).await;

        // The second offer could go nowhere and must not leak pending work.
        assert_eq!(frontier.pending().count(), 1);
    }

    #[tokio::test]
    async fn drain_loop_readmits_spilled_entries() {
        let frontier = Arc::new(Frontier::new(1, MemoryOverflow::new()));
        let (cancel, mut shutdown) = shutdown_pair();

        frontier.offer("https://site/a".to_string()).await;
        frontier.offer("https://site/b".to_string()).await;

        let drain = tokio::spawn({
            let frontier = Arc::clone(&frontier);
            let shutdown = shutdown.clone();
            async move { frontier.run_drain(shutdown).await }
        });

        let first = frontier.take(&mut shutdown).await;
        let second = frontier.take(&mut shutdown).await;
        assert_eq!(first.as_deref(), Some("https://site/a"));
        assert_eq!(second.as_deref(), Some("https://site/b"));

        cancel.send(true).unwrap();
        drain.await.unwrap();
    }

    #[tokio::test]
    async fn reconcile_recovers_stale_entries() {
        let overflow = MemoryOverflow::new();
        overflow.preload("https://site/stale-1");
        overflow.preload("https://site/stale-2");
        let frontier = Frontier::new(8, overflow);

        let recovered = frontier.reconcile_overflow().await;
        assert_eq!(recovered, 2);
        assert_eq!(frontier.pending().count(), 2);
        assert_eq!(frontier.depth(), 2);
    }

    #[tokio::test]
    async fn wait_idle_resolves_when_count_returns_to_zero() {
        let pending = Arc::new(PendingWork::default());
        pending.incr();

        let waiter = tokio::spawn({
            let pending = Arc::clone(&pending);
            async move { pending.wait_idle().await }
        });

        tokio::task::yield_now().await;
        pending.decr();
        waiter.await.unwrap();
        assert_eq!(pending.count(), 0);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "decrement without matching increment")]
    fn unmatched_decrement_panics_in_debug_builds() {
        let pending = PendingWork::default();
        pending.decr();
    }

    #[tokio::test]
    async fn wait_idle_resolves_immediately_when_already_idle() {
        let pending = PendingWork::default();
        pending.wait_idle().await;
    }

    #[tokio::test]
    async fn take_returns_none_after_shutdown() {
        let frontier = Frontier::new(4, MemoryOverflow::new());
        let (cancel, mut shutdown) = shutdown_pair();
        cancel.send(true).unwrap();
        assert_eq!(frontier.take(&mut shutdown).await, None);
    }
}
