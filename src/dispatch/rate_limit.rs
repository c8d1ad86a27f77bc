//! Process-wide outbound request throttle
//!
//! Counts calls issued within the current wall-clock second. Once the count
//! reaches the ceiling, the next caller sleeps until the second rolls over.

use chrono::Utc;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct RateLimiterState {
    /// Unix second the current window belongs to
    window: i64,
    /// Calls issued within `window`
    calls: u32,
}

/// Throttle enforcing a maximum number of external API calls per second
#[derive(Debug, Default)]
pub struct RateLimiter {
    state: Mutex<RateLimiterState>,
}

impl RateLimiter {
    /// Create a limiter with an empty window
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one outbound call, sleeping first if the window is exhausted.
    ///
    /// `None` disables throttling entirely.
    pub async fn throttle(&self, max_per_second: Option<u32>) {
        let Some(max) = max_per_second.filter(|m| *m > 0) else {
            return;
        };

        let wait = {
            let mut state = self.lock();
            let now = Utc::now();
            let second = now.timestamp();
            if state.window != second {
                state.window = second;
                state.calls = 0;
            }
            if state.calls < max {
                state.calls += 1;
                None
            } else {
                let remaining_ms = 1000 - u64::from(now.timestamp_subsec_millis().min(999));
                Some(Duration::from_millis(remaining_ms))
            }
        };

        if let Some(wait) = wait {
            info!(
                max_per_second = max,
                wait_ms = wait.as_millis() as u64,
                "Max API requests per second reached, sleeping until next window"
            );
            crate::metrics::record_rate_limit_pause(wait);
            sleep(wait).await;
            let mut state = self.lock();
            let second = Utc::now().timestamp();
            if state.window != second {
                state.window = second;
                state.calls = 0;
            }
            state.calls += 1;
        }
    }

    /// Start a fresh window after the caller paused on its own
    pub fn reset_window(&self) {
        let mut state = self.lock();
        state.window = Utc::now().timestamp();
        state.calls = 0;
        debug!("Rate limiter window reset");
    }

    /// Calls issued so far in the current window
    pub fn calls_in_window(&self) -> u32 {
        let state = self.lock();
        if state.window == Utc::now().timestamp() {
            state.calls
        } else {
            0
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RateLimiterState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
