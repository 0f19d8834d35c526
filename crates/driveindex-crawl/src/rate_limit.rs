//! Rolling-window request rate limiter shared by every worker.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use driveindex_core::{IndexError, RateLimitConfig, permits_per_window};

/// Bounds the number of requests issued in any rolling window.
///
/// At most `floor(capacity * fill_factor)` permits are granted within any
/// interval of length `window`. Callers over the limit sleep until the oldest
/// permit leaves the window.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    issued: Mutex<VecDeque<Instant>>,
    total_issued: AtomicU64,
}

impl RateLimiter {
    /// Create a limiter from configuration.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_limit(config.permits_per_window(), config.window())
    }

    /// Create a limiter from raw capacity, window and fill factor.
    pub fn with_limits(capacity: u32, window: Duration, fill_factor: f64) -> Self {
        Self::with_limit(permits_per_window(capacity, fill_factor), window)
    }

    fn with_limit(limit: usize, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            issued: Mutex::new(VecDeque::with_capacity(limit)),
            total_issued: AtomicU64::new(0),
        }
    }

    /// Permits allowed per window.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Permits granted since the limiter was created.
    pub fn total_issued(&self) -> u64 {
        self.total_issued.load(Ordering::Relaxed)
    }

    /// Permits granted within the current window.
    pub fn in_window(&self) -> usize {
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        self.expire(&mut issued, Instant::now());
        issued.len()
    }

    /// Wait for a permit.
    ///
    /// Returns [`IndexError::Cancelled`] as soon as `cancel` fires, even while
    /// sleeping.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), IndexError> {
        loop {
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }

            let Some(wait) = self.try_issue(Instant::now()) else {
                return Ok(());
            };

            trace!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
            sleep_or_cancel(wait, cancel).await?;
        }
    }

    /// Take a permit if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.try_issue(Instant::now()).is_none()
    }

    /// Issue a permit at `now`, or return how long until one frees up.
    fn try_issue(&self, now: Instant) -> Option<Duration> {
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        self.expire(&mut issued, now);

        if issued.len() < self.limit {
            issued.push_back(now);
            self.total_issued.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let oldest = issued.front().copied().unwrap_or(now);
        Some(self.window.saturating_sub(now.duration_since(oldest)))
    }

    fn expire(&self, issued: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = issued.front() {
            if now.duration_since(oldest) >= self.window {
                issued.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Sleep for `duration` unless `cancel` fires first.
pub(crate) async fn sleep_or_cancel(
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<(), IndexError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(IndexError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_from_config() {
        let limiter = RateLimiter::new(&RateLimitConfig::default());
        assert_eq!(limiter.limit(), 810);
        assert_eq!(limiter.window(), Duration::from_secs(100));
    }

    #[test]
    fn test_limit_survives_float_error() {
        let limiter = RateLimiter::with_limits(100, Duration::from_secs(1), 0.29);
        assert_eq!(limiter.limit(), 29);
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_acquire_stops_at_limit() {
        let limiter = RateLimiter::with_limits(10, Duration::from_secs(1), 0.5);

        for _ in 0..5 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());
        assert_eq!(limiter.in_window(), 5);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(limiter.in_window(), 0);
        assert!(limiter.try_acquire());
        assert_eq!(limiter.total_issued(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_window() {
        let limiter = RateLimiter::with_limits(2, Duration::from_secs(10), 1.0);
        let cancel = CancellationToken::new();
        let start = Instant::now();

        limiter.acquire(&cancel).await.unwrap();
        limiter.acquire(&cancel).await.unwrap();
        limiter.acquire(&cancel).await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_is_cancellable_while_waiting() {
        let limiter = RateLimiter::with_limits(1, Duration::from_secs(3600), 1.0);
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();

        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            stopper.cancel();
        });

        let result = limiter.acquire(&cancel).await;
        assert!(matches!(result, Err(IndexError::Cancelled)));
        assert_eq!(limiter.total_issued(), 1);
    }
}
