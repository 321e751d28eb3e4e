//! Counting limiters for dump processes and outbound requests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

#[derive(Debug)]
struct LimiterInner {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_use: AtomicUsize,
    peak: AtomicUsize,
}

/// Shared cap on concurrent work of one kind.
///
/// Clones share the same slots. Tests build their own limiter with a small
/// capacity; production code builds one per run.
#[derive(Debug, Clone)]
pub struct Limiter {
    inner: Arc<LimiterInner>,
}

/// Cap on concurrently running dump processes.
pub type DumpLimiter = Limiter;

/// Cap on in-flight HTTP requests to the raw-content host.
pub type RequestLimiter = Limiter;

impl Limiter {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(LimiterInner {
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity,
                in_use: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    /// Wait for a free slot. Only the calling task is suspended.
    pub async fn acquire(&self) -> Result<Slot, AcquireError> {
        let permit = Arc::clone(&self.inner.semaphore).acquire_owned().await?;
        let now = self.inner.in_use.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);
        Ok(Slot {
            inner: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    pub fn in_use(&self) -> usize {
        self.inner.in_use.load(Ordering::SeqCst)
    }

    /// Highest number of slots held at once since creation.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }
}

/// One held slot. Released exactly once, on drop.
#[derive(Debug)]
pub struct Slot {
    inner: Arc<LimiterInner>,
    _permit: OwnedSemaphorePermit,
}

/// Slot held for the lifetime of one dump process.
pub type DumpSlot = Slot;

impl Drop for Slot {
    fn drop(&mut self) {
        // The permit field drops after this, so `in_use` never over-reports.
        self.inner.in_use.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let limiter = DumpLimiter::new(2);
        let a = limiter.acquire().await.unwrap();
        let b = limiter.acquire().await.unwrap();
        assert_eq!(limiter.available(), 0);
        assert_eq!(limiter.in_use(), 2);

        drop(a);
        assert_eq!(limiter.available(), 1);
        assert_eq!(limiter.in_use(), 1);
        drop(b);
        assert_eq!(limiter.available(), 2);
        assert_eq!(limiter.peak(), 2);
    }

    #[tokio::test]
    async fn test_third_acquire_waits() {
        let limiter = DumpLimiter::new(1);
        let held = limiter.acquire().await.unwrap();

        let waiting = tokio::time::timeout(Duration::from_millis(50), limiter.acquire()).await;
        assert!(waiting.is_err(), "second acquire must block while the slot is held");

        drop(held);
        let slot = tokio::time::timeout(Duration::from_millis(500), limiter.acquire())
            .await
            .expect("slot freed")
            .unwrap();
        drop(slot);
        assert_eq!(limiter.peak(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_slots() {
        let limiter = DumpLimiter::new(1);
        let clone = limiter.clone();
        let _slot = clone.acquire().await.unwrap();
        assert_eq!(limiter.available(), 0);
        assert_eq!(limiter.capacity(), 1);
    }
}
