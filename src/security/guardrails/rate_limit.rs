use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Fixed-window per-action counters.
///
/// All counters are cleared together when the window elapses, so a caller can
/// land up to twice the limit across a window boundary (a full window's worth
/// right before the reset and another right after). This is the intended
/// behavior, not a sliding window.
#[derive(Debug)]
pub struct RateLimitState {
    counts: HashMap<String, u32>,
    window_start: Instant,
    window: Duration,
    max_per_window: u32,
}

impl RateLimitState {
    pub fn new(max_per_window: u32, window: Duration, now: Instant) -> Self {
        Self {
            counts: HashMap::new(),
            window_start: now,
            window,
            max_per_window,
        }
    }

    /// Clear every counter when the current window has elapsed.
    pub fn roll_window(&mut self, now: Instant) {
        if now.saturating_duration_since(self.window_start) >= self.window {
            self.counts.clear();
            self.window_start = now;
        }
    }

    pub fn is_exhausted(&self, action: &str) -> bool {
        self.count(action) >= self.max_per_window
    }

    pub fn record(&mut self, action: &str) -> u32 {
        let count = self.counts.entry(action.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn count(&self, action: &str) -> u32 {
        self.counts.get(action).copied().unwrap_or(0)
    }

    pub fn max_per_window(&self) -> u32 {
        self.max_per_window
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
