//! Two-window request budget.
//!
//! Tracks rolling one-second and one-minute windows against the external
//! API's caps. Windows are aligned to wall-clock boundaries so counters
//! reset exactly at rollover. Counters are atomic: the governor is the one
//! piece of state shared across all user passes.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use crate::error::{MarketDataError, RateWindow};

/// Caps for the two budget windows.
#[derive(Debug, Clone)]
pub struct GovernorConfig {
    /// Maximum requests per second.
    pub max_per_second: u32,
    /// Maximum requests per minute.
    pub max_per_minute: u32,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_per_second: 10,
            max_per_minute: 200,
        }
    }
}

#[derive(Debug)]
struct Window {
    len_ms: i64,
    start_ms: AtomicI64,
    count: AtomicU32,
}

impl Window {
    fn new(len_ms: i64) -> Self {
        Self {
            len_ms,
            start_ms: AtomicI64::new(i64::MIN),
            count: AtomicU32::new(0),
        }
    }

    /// Align a timestamp to this window's boundary.
    fn bucket(&self, now_ms: i64) -> i64 {
        now_ms - now_ms.rem_euclid(self.len_ms)
    }

    /// Try to take one slot; returns false when the cap is reached.
    fn try_acquire(&self, now_ms: i64, cap: u32) -> bool {
        let bucket = self.bucket(now_ms);
        let start = self.start_ms.load(Ordering::Acquire);

        if start != bucket
            && self
                .start_ms
                .compare_exchange(start, bucket, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            // We won the rollover; the old count belongs to the old window.
            self.count.store(0, Ordering::Release);
        }

        let prev = self.count.fetch_add(1, Ordering::AcqRel);
        if prev >= cap {
            self.count.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        true
    }

    /// Release a previously acquired slot.
    fn release(&self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }

    fn count(&self, now_ms: i64) -> u32 {
        if self.start_ms.load(Ordering::Acquire) == self.bucket(now_ms) {
            self.count.load(Ordering::Acquire)
        } else {
            0
        }
    }
}

/// Rolling two-window rate budget in front of the quote source.
#[derive(Debug)]
pub struct RateGovernor {
    config: GovernorConfig,
    second: Window,
    minute: Window,
}

impl RateGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            second: Window::new(1_000),
            minute: Window::new(60_000),
        }
    }

    /// Take one request slot at `now_ms`.
    ///
    /// Fails synchronously with `RateLimitExceeded` when either window is
    /// at its cap; the caller must not retry immediately.
    pub fn try_acquire(&self, now_ms: i64) -> Result<(), MarketDataError> {
        if !self
            .second
            .try_acquire(now_ms, self.config.max_per_second)
        {
            return Err(MarketDataError::RateLimitExceeded {
                window: RateWindow::Second,
            });
        }

        if !self.minute.try_acquire(now_ms, self.config.max_per_minute) {
            // Undo the second-window slot so it is not leaked.
            self.second.release();
            return Err(MarketDataError::RateLimitExceeded {
                window: RateWindow::Minute,
            });
        }

        Ok(())
    }

    /// Requests counted in the current one-second window.
    pub fn requests_this_second(&self, now_ms: i64) -> u32 {
        self.second.count(now_ms)
    }

    /// Requests counted in the current one-minute window.
    pub fn requests_this_minute(&self, now_ms: i64) -> u32 {
        self.minute.count(now_ms)
    }
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new(GovernorConfig::default())
    }
}
