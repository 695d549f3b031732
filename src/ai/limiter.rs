//! Concurrency limiter for model requests
//!
//! Bounds the number of in-flight requests against the model endpoint.
//! One limiter is shared by every run in the process; clones share state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

#[derive(Debug)]
struct Inner {
    semaphore: Semaphore,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    limit: usize,
}

/// Shared semaphore with in-flight accounting
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    inner: Arc<Inner>,
}

/// Held for the duration of one request; releases its slot on drop
pub struct LimiterPermit<'a> {
    _permit: SemaphorePermit<'a>,
    inner: &'a Inner,
}

impl Drop for LimiterPermit<'_> {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ConcurrencyLimiter {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            inner: Arc::new(Inner {
                semaphore: Semaphore::new(limit),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                limit,
            }),
        }
    }

    /// Wait for a free slot
    pub async fn acquire(&self) -> LimiterPermit<'_> {
        // Never closed: the limiter owns the semaphore
        let permit = self.inner.semaphore.acquire().await.expect("Semaphore closed");

        let now = self.inner.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.peak.fetch_max(now, Ordering::AcqRel);

        LimiterPermit {
            _permit: permit,
            inner: &self.inner,
        }
    }

    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    /// Requests currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Highest number of simultaneous requests seen so far
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_permit_release_on_drop() {
        let limiter = ConcurrencyLimiter::new(2);
        {
            let _a = limiter.acquire().await;
            let _b = limiter.acquire().await;
            assert_eq!(limiter.in_flight(), 2);
        }
        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.peak(), 2);
    }

    #[tokio::test]
    async fn test_zero_limit_is_clamped() {
        let limiter = ConcurrencyLimiter::new(0);
        assert_eq!(limiter.limit(), 1);
        let _permit = limiter.acquire().await;
        assert_eq!(limiter.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_peak_never_exceeds_limit() {
        let limiter = ConcurrencyLimiter::new(3);
        let mut handles = Vec::new();
        for _ in 0..12 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                let _permit = limiter.acquire().await;
                tokio::time::sleep(Duration::from_millis(5)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(limiter.peak() <= 3);
        assert_eq!(limiter.in_flight(), 0);
    }
}
