//! Client-side request rate limiting
//!
//! Guarantees at most `max_per_second` dispatches in any rolling one-second
//! window. Callers `acquire()` a slot before each dispatch; when the window
//! is full they wait until the oldest dispatch ages out.
//!
//! The dispatch-timestamp queue lives behind a tokio `Mutex` that is held
//! across the scheduling sleep. Since the mutex wakes waiters in FIFO
//! order, callers are granted slots strictly in arrival order.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

const WINDOW: Duration = Duration::from_secs(1);

/// Rolling-window rate limiter.
pub struct RateLimiter {
    max_per_window: usize,
    dispatches: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// A limiter allowing `max_per_second` dispatches per rolling second.
    /// A zero limit is treated as one; config validation rejects it earlier.
    pub fn new(max_per_second: usize) -> Self {
        Self {
            max_per_window: max_per_second.max(1),
            dispatches: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait for a dispatch slot.
    ///
    /// Returns once the caller may send a request without exceeding the
    /// rolling window. The queue mutex is held across the sleep so that
    /// waiters behind this caller cannot jump the line.
    pub async fn acquire(&self) {
        let mut dispatches = self.dispatches.lock().await;
        loop {
            let now = Instant::now();
            while dispatches
                .front()
                .is_some_and(|&t| now.duration_since(t) >= WINDOW)
            {
                dispatches.pop_front();
            }

            if dispatches.len() < self.max_per_window {
                dispatches.push_back(now);
                return;
            }

            let Some(&oldest) = dispatches.front() else {
                continue;
            };
            trace!(queued = dispatches.len(), "rate limit window full, waiting");
            tokio::time::sleep_until(oldest + WINDOW).await;
        }
    }
}
