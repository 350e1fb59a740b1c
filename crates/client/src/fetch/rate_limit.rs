//! Minimum-interval rate limiter.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rentwire_core::Clock;
use tokio::sync::Mutex;

/// Rate limiter to enforce request intervals.
///
/// Callers are serialized on the lock, so concurrent searches hitting the
/// same portal are spaced by `min_interval` as well.
#[derive(Debug)]
pub struct RateLimiter {
    last_request: Mutex<Option<DateTime<Utc>>>,
    min_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { last_request: Mutex::new(None), min_interval, clock }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Acquire permission to make a request, waiting if necessary.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = (self.clock.now() - previous).to_std().unwrap_or(Duration::ZERO);
            if elapsed < self.min_interval {
                self.clock.sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(self.clock.now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rentwire_core::ManualClock;

    #[tokio::test]
    async fn test_first_acquire_does_not_wait() {
        let clock = Arc::new(ManualClock::default());
        let limiter = RateLimiter::new(Duration::from_secs(3), clock.clone());

        limiter.acquire().await;
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_back_to_back_requests_are_spaced() {
        let clock = Arc::new(ManualClock::default());
        let limiter = RateLimiter::new(Duration::from_secs(3), clock.clone());

        limiter.acquire().await;
        clock.advance(Duration::from_secs(1));
        limiter.acquire().await;
        limiter.acquire().await;

        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2), Duration::from_secs(3)]);
    }

    #[tokio::test]
    async fn test_no_wait_after_interval_passed() {
        let clock = Arc::new(ManualClock::default());
        let limiter = RateLimiter::new(Duration::from_millis(2500), clock.clone());

        limiter.acquire().await;
        clock.advance(Duration::from_secs(10));
        limiter.acquire().await;
        assert!(clock.sleeps().is_empty());
    }
}
