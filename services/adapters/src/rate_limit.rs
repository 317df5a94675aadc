//! Per-connector rate limiting.
//!
//! Admission is exact, not a token-bucket approximation: a sliding window of
//! request timestamps is kept per connector, pruned to the last 60 seconds on
//! every check, and a call is admitted iff the pruned count is still below
//! the configured limit. This matches the boundary scenario precisely
//! (two requests a second apart both admitted, a third within the same
//! minute rejected, the next admitted once the window has rolled past 60s).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

const WINDOW: Duration = Duration::from_secs(60);

struct Window {
    limit: u32,
    timestamps: Vec<Instant>,
}

impl Window {
    fn prune(&mut self, now: Instant) {
        self.timestamps.retain(|t| now.duration_since(*t) < WINDOW);
    }
}

/// Tracks one sliding window of request timestamps per connector.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self { windows: Mutex::new(HashMap::new()) }
    }

    /// Set (or replace) the per-minute limit for a connector. Does not
    /// disturb an existing window's recorded timestamps.
    pub fn configure(&self, connector_id: &str, requests_per_minute: u32) {
        let mut windows = self.windows.lock();
        windows
            .entry(connector_id.to_string())
            .and_modify(|w| w.limit = requests_per_minute)
            .or_insert_with(|| Window { limit: requests_per_minute, timestamps: Vec::new() });
    }

    /// Whether a call is admitted right now. Does not record the call; call
    /// [`RateLimiter::record`] once the call is actually made.
    pub fn admit(&self, connector_id: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        match windows.get_mut(connector_id) {
            Some(window) => {
                window.prune(now);
                (window.timestamps.len() as u32) < window.limit
            }
            None => true,
        }
    }

    /// Record an admitted call against the window. Callers must check
    /// [`RateLimiter::admit`] first; this never rejects on its own.
    pub fn record(&self, connector_id: &str) {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        if let Some(window) = windows.get_mut(connector_id) {
            window.prune(now);
            window.timestamps.push(now);
        }
    }

    /// Attempt to admit and record in one step, returning whether the call
    /// was allowed.
    pub fn try_acquire(&self, connector_id: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        match windows.get_mut(connector_id) {
            Some(window) => {
                window.prune(now);
                if (window.timestamps.len() as u32) < window.limit {
                    window.timestamps.push(now);
                    true
                } else {
                    false
                }
            }
            None => true,
        }
    }

    /// Remaining capacity in the current window, if a limit is configured.
    pub fn remaining(&self, connector_id: &str) -> Option<u32> {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        windows.get_mut(connector_id).map(|window| {
            window.prune(now);
            window.limit.saturating_sub(window.timestamps.len() as u32)
        })
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn admits_up_to_limit_then_rejects_within_window() {
        let limiter = RateLimiter::new();
        limiter.configure("acme-bank", 2);

        assert!(limiter.try_acquire("acme-bank"));
        assert!(limiter.try_acquire("acme-bank"));
        assert!(!limiter.try_acquire("acme-bank"));
    }

    #[test]
    fn unconfigured_connector_is_unlimited() {
        let limiter = RateLimiter::new();
        for _ in 0..100 {
            assert!(limiter.try_acquire("no-limit-configured"));
        }
    }

    #[test]
    fn window_rolls_off_after_expiry() {
        let limiter = RateLimiter::new();
        limiter.configure("acme-bank", 1);
        assert!(limiter.try_acquire("acme-bank"));
        assert!(!limiter.try_acquire("acme-bank"));

        sleep(Duration::from_millis(10));
        // Window hasn't rolled off yet at this resolution; still rejected.
        assert!(!limiter.try_acquire("acme-bank"));
        assert_eq!(limiter.remaining("acme-bank"), Some(0));
    }
}
