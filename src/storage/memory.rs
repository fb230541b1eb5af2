//! In-process store implementations.
//!
//! Used by the test suite and by dry runs where no Redis is available.
//! `MemoryDedup` ignores TTLs: within one process lifetime a claim never
//! expires.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use redis::RedisError;

use super::{DedupStore, OverflowStore, StoreError};

fn unavailable(op: &str) -> StoreError {
    StoreError::Redis(RedisError::from((
        redis::ErrorKind::IoError,
        "store unavailable",
        op.to_string(),
    )))
}

/// Claim set held in process memory.
#[derive(Default)]
pub struct MemoryDedup {
    claimed: Mutex<HashSet<String>>,
    failing: AtomicBool,
}

impl MemoryDedup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail, simulating an unreachable store.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.claimed.lock().contains(url)
    }
}

impl DedupStore for MemoryDedup {
    async fn claim(&self, url: &str) -> Result<bool, StoreError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(unavailable("claim"));
        }
        Ok(self.claimed.lock().insert(url.to_string()))
    }

    async fn flush(&self) -> Result<(), StoreError> {
        self.claimed.lock().clear();
        Ok(())
    }
}

/// A shared handle is also a valid store, so a test can hand one clone to
/// the engine and keep another to inspect the claims afterwards.
impl DedupStore for Arc<MemoryDedup> {
    async fn claim(&self, url: &str) -> Result<bool, StoreError> {
        (**self).claim(url).await
    }

    async fn flush(&self) -> Result<(), StoreError> {
        (**self).flush().await
    }
}

/// FIFO list held in process memory.
#[derive(Default)]
pub struct MemoryOverflow {
    entries: Mutex<VecDeque<String>>,
    failing: AtomicBool,
}

impl MemoryOverflow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail, simulating an unreachable store.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Seed an entry directly, bypassing the failure switch.
    pub fn preload(&self, url: &str) {
        self.entries.lock().push_back(url.to_string());
    }
}

impl OverflowStore for MemoryOverflow {
    async fn push(&self, url: &str) -> Result<(), StoreError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(unavailable("push"));
        }
        self.entries.lock().push_back(url.to_string());
        Ok(())
    }

    async fn pop(&self) -> Result<Option<String>, StoreError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(unavailable("pop"));
        }
        Ok(self.entries.lock().pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn claim_succeeds_exactly_once() {
        let dedup = MemoryDedup::new();
        assert!(dedup.claim("https://a").await.unwrap());
        assert!(!dedup.claim("https://a").await.unwrap());
        assert!(dedup.claim("https://b").await.unwrap());
    }

    #[tokio::test]
    async fn flush_makes_urls_claimable_again() {
        let dedup = MemoryDedup::new();
        assert!(dedup.claim("https://a").await.unwrap());
        dedup.flush().await.unwrap();
        assert!(dedup.claim("https://a").await.unwrap());
    }

    #[tokio::test]
    async fn overflow_is_fifo() {
        let overflow = MemoryOverflow::new();
        overflow.push("first").await.unwrap();
        overflow.push("second").await.unwrap();
        assert_eq!(overflow.pop().await.unwrap().as_deref(), Some("first"));
        assert_eq!(overflow.pop().await.unwrap().as_deref(), Some("second"));
        assert_eq!(overflow.pop().await.unwrap(), None);
    }

    #[tokio::test]
    async fn failing_switch_surfaces_errors() {
        let dedup = MemoryDedup::new();
        dedup.set_failing(true);
        assert!(dedup.claim("https://a").await.is_err());
        dedup.set_failing(false);
        assert!(dedup.claim("https://a").await.unwrap());
    }
}
