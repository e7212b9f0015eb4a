//! Fixed-window rate limiter with bounded key tracking.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Per-key request budget over a fixed window.
///
/// Expired windows are evicted on access. When `max_keys` distinct keys are
/// tracked, the key with the oldest window is dropped to make room.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    max_keys: usize,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32, max_keys: usize) -> Self {
        Self {
            window,
            max_requests,
            max_keys: max_keys.max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record a request for `key`; false when its budget is spent
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    pub(crate) fn check_at(&self, key: &str, now: Instant) -> bool {
        let Ok(mut windows) = self.windows.lock() else {
            return false;
        };

        windows.retain(|_, w| now.saturating_duration_since(w.started) < self.window);

        if let Some(w) = windows.get_mut(key) {
            if w.count >= self.max_requests {
                return false;
            }
            w.count += 1;
            return true;
        }

        if windows.len() >= self.max_keys {
            let oldest = windows
                .iter()
                .min_by_key(|(k, w)| (w.started, (*k).clone()))
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                windows.remove(&oldest);
            }
        }

        if self.max_requests == 0 {
            return false;
        }
        windows.insert(
            key.to_string(),
            Window {
                started: now,
                count: 1,
            },
        );
        true
    }

    /// Number of keys currently tracked
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().map(|w| w.len()).unwrap_or(0)
    }
}
