use std::{collections::VecDeque, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Sliding-window limiter: at most `max_requests` grants in any `window`.
///
/// Callers reserve slots in arrival order under the lock and then sleep
/// outside it, so release is FIFO-ish and nobody holds the lock while waiting.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    grants: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        let max_requests = max_requests.max(1) as usize;
        Self {
            max_requests,
            window,
            grants: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    pub fn per_second(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(1))
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Wait until a slot is free. Never fails; waiting is unbounded.
    pub async fn acquire(&self) {
        let wait = self.reserve_at(Instant::now()).await;
        if wait > Duration::ZERO {
            sleep(wait).await;
        }
    }

    /// Reserve the next slot and return the wait required before using it.
    async fn reserve_at(&self, now: Instant) -> Duration {
        let mut grants = self.grants.lock().await;

        let slot = if grants.len() < self.max_requests {
            now
        } else {
            // The deque is sorted; the oldest grant decides when a slot frees up.
            let oldest = grants.pop_front().unwrap_or(now);
            let free_at = oldest + self.window;
            if free_at > now {
                free_at
            } else {
                now
            }
        };

        grants.push_back(slot);
        slot.saturating_duration_since(now)
    }
}
