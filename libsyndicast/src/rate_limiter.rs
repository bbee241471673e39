//! Sliding-window rate limiting for platform clients
//!
//! Every platform client owns exactly one limiter. Windows are never shared,
//! so two accounts on the same platform throttle independently.

use std::collections::VecDeque;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;

/// Length of the trailing window
pub const WINDOW: Duration = Duration::from_secs(60);

/// Bounds call starts to `calls_per_minute` within any trailing 60 seconds
pub struct RateLimiter {
    calls_per_minute: usize,
    /// Start times of calls still inside the window, oldest first
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter. A limit of 0 is treated as 1.
    pub fn new(calls_per_minute: u32) -> Self {
        Self {
            calls_per_minute: calls_per_minute.max(1) as usize,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    pub fn calls_per_minute(&self) -> u32 {
        self.calls_per_minute as u32
    }

    /// Wait until another call may start, then record it.
    ///
    /// Never drops a call; it only delays it until the oldest recorded call
    /// leaves the window.
    pub async fn wait_if_needed(&self) {
        // Held across the sleep: concurrent callers of one client queue here.
        let mut calls = self.calls.lock().await;

        let now = Instant::now();
        prune(&mut calls, now);

        if calls.len() >= self.calls_per_minute {
            if let Some(&oldest) = calls.front() {
                let wait = WINDOW.saturating_sub(now.duration_since(oldest));
                if !wait.is_zero() {
                    debug!(
                        wait_secs = wait.as_secs_f64(),
                        limit = self.calls_per_minute,
                        "Rate limit reached, waiting"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
            prune(&mut calls, Instant::now());
        }

        calls.push_back(Instant::now());
    }

    /// Number of calls currently inside the window
    pub async fn recent_calls(&self) -> usize {
        let mut calls = self.calls.lock().await;
        prune(&mut calls, Instant::now());
        calls.len()
    }
}

fn prune(calls: &mut VecDeque<Instant>, now: Instant) {
    while let Some(&oldest) = calls.front() {
        if now.duration_since(oldest) >= WINDOW {
            calls.pop_front();
        } else {
            break;
        }
    }
}
