//! Minimum-interval rate limiter for outbound provider calls.
//!
//! All provider calls of one [`WebSearchService`](crate::web_search::WebSearchService)
//! share a limiter, so concurrent category searches still respect the
//! free provider's request budget.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Wait for the next free slot and reserve it.
    ///
    /// Slots are handed out in lock-acquisition order, `interval` apart.
    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }

        let wait_until = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(t) if t > now => t,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };

        if wait_until > Instant::now() {
            tracing::trace!(wait = ?(wait_until - Instant::now()), "rate limiting provider call");
            tokio::time::sleep_until(wait_until).await;
        }
    }
}
