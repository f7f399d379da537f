//! Per-path token bucket rate limiter.
//!
//! A `parking_lot::Mutex`-guarded map keyed by REST path, entries created
//! lazily on first use. Refill is a hard reset at the interval boundary
//! rather than a rolling window, and `wait` suspends the caller (and can be
//! cancelled) instead of rejecting outright.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::ConnectorError;

struct Bucket {
    tokens: u32,
    max_tokens: u32,
    interval: Duration,
    last_fill: Instant,
}

impl Bucket {
    fn new(max_tokens: u32, interval: Duration) -> Self {
        Self {
            tokens: max_tokens,
            max_tokens,
            interval,
            last_fill: Instant::now(),
        }
    }

    /// Refill to `max_tokens` if a full interval has elapsed since the last fill.
    fn maybe_refill(&mut self, now: Instant) {
        if now.saturating_duration_since(self.last_fill) >= self.interval {
            self.tokens = self.max_tokens;
            self.last_fill = now;
        }
    }

    fn try_take(&mut self, now: Instant) -> bool {
        self.maybe_refill(now);
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn next_refill_at(&self) -> Instant {
        self.last_fill + self.interval
    }
}

/// A process-wide map of per-path token buckets, lazily created on first use
/// and stored in a concurrent map shared across every caller.
#[derive(Clone, Default)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, Bucket>>>,
    cancel_notify: Arc<Notify>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake every in-flight `wait` so it re-checks its cancellation token
    /// immediately instead of sleeping out the remainder of the interval.
    pub fn notify_cancelled(&self) {
        self.cancel_notify.notify_waiters();
    }

    /// Block until a token is available for `path`, or until `cancelled`
    /// completes first. Deterministic refill: tokens reset to `max_tokens`
    /// every `interval`, never probabilistically.
    pub async fn wait(
        &self,
        path: &str,
        max_tokens: u32,
        interval: Duration,
        cancelled: impl std::future::Future<Output = ()>,
    ) -> Result<(), ConnectorError> {
        tokio::pin!(cancelled);
        loop {
            let now = Instant::now();
            let (acquired, sleep_until) = {
                let mut buckets = self.buckets.lock();
                let bucket = buckets
                    .entry(path.to_string())
                    .or_insert_with(|| Bucket::new(max_tokens, interval));
                bucket.max_tokens = max_tokens;
                bucket.interval = interval;
                if bucket.try_take(now) {
                    (true, None)
                } else {
                    (false, Some(bucket.next_refill_at()))
                }
            };

            if acquired {
                return Ok(());
            }

            let sleep_until = sleep_until.unwrap_or(now + interval);
            tokio::select! {
                _ = tokio::time::sleep_until(sleep_until) => continue,
                _ = self.cancel_notify.notified() => continue,
                _ = &mut cancelled => return Err(ConnectorError::Cancelled),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future;

    #[tokio::test(start_paused = true)]
    async fn allows_up_to_max_tokens_per_interval() {
        let limiter = RateLimiter::new();
        for _ in 0..3 {
            limiter
                .wait("orders", 3, Duration::from_millis(100), future::pending())
                .await
                .unwrap();
        }
        // Fourth call within the same interval must wait for refill rather
        // than returning immediately.
        let started = Instant::now();
        limiter
            .wait("orders", 3, Duration::from_millis(100), future::pending())
            .await
            .unwrap();
        assert!(Instant::now().saturating_duration_since(started) >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_returns_without_consuming_a_token() {
        let limiter = RateLimiter::new();
        limiter
            .wait("orders", 1, Duration::from_secs(1), future::pending())
            .await
            .unwrap();

        // Bucket is now empty; a cancelled wait must fail rather than stall
        // for the remainder of the interval.
        let result = limiter
            .wait("orders", 1, Duration::from_secs(1), future::ready(()))
            .await;
        assert!(matches!(result, Err(ConnectorError::Cancelled)));
    }

    #[tokio::test]
    async fn buckets_are_independent_per_path() {
        let limiter = RateLimiter::new();
        limiter
            .wait("a", 1, Duration::from_secs(10), future::pending())
            .await
            .unwrap();
        // A different path must not be starved by "a"'s exhausted bucket.
        limiter
            .wait("b", 1, Duration::from_secs(10), future::pending())
            .await
            .unwrap();
    }
}
