use std::time::{Duration, Instant};

use dashmap::DashMap;

pub const MAX_LOGIN_FAILURES: u32 = 5;
pub const LOGIN_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Per-identifier login brute force limiter.
pub struct LoginRateLimiter {
    /// identifier -> (failed_count, window_start)
    entries: DashMap<String, (u32, Instant)>,
    max_failures: u32,
    window: Duration,
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new(MAX_LOGIN_FAILURES, LOGIN_WINDOW)
    }
}

impl LoginRateLimiter {
    pub fn new(max_failures: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_failures,
            window,
        }
    }

    /// Returns `Err(retry_after_secs)` once the identifier has used up its failures.
    /// Does not count the attempt; call `record_failure()` on bad credentials.
    pub fn check(&self, identifier: &str) -> Result<(), u64> {
        let key = identifier.trim().to_lowercase();
        let now = Instant::now();

        let Some(entry) = self.entries.get(&key) else {
            return Ok(());
        };
        let (count, start) = *entry.value();
        drop(entry);

        if now.duration_since(start) > self.window {
            self.entries.remove(&key);
            return Ok(());
        }

        if count >= self.max_failures {
            let elapsed = now.duration_since(start).as_secs();
            return Err(self.window.as_secs().saturating_sub(elapsed).max(1));
        }

        Ok(())
    }

    pub fn record_failure(&self, identifier: &str) {
        let now = Instant::now();

        let mut entry = self
            .entries
            .entry(identifier.trim().to_lowercase())
            .or_insert((0, now));
        let (count, start) = entry.value_mut();

        if now.duration_since(*start) > self.window {
            *count = 1;
            *start = now;
        } else {
            *count += 1;
        }
    }

    /// Forget failures after a successful login.
    pub fn clear(&self, identifier: &str) {
        self.entries.remove(&identifier.trim().to_lowercase());
    }
}
