//! Reconnect backoff schedule
//!
//! Doubling delays starting at 5 seconds, clamped to the configured
//! ceiling: 5s, 10s, 20s, 40s, 80s, ... The attempt counter resets on
//! every successful initialization and successful sync. A `pending` flag
//! guarantees at most one scheduled retry exists at any time.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

/// First retry delay
pub const BASE_DELAY: Duration = Duration::from_secs(5);

/// Shift cap so the doubling factor cannot overflow
const MAX_DOUBLINGS: u32 = 16;

/// Retry bookkeeping shared between the sync controller and its spawned
/// retry tasks
pub struct RetrySchedule {
    attempts: AtomicU32,
    pending: AtomicBool,
    base: Duration,
    max: Duration,
    max_retries: Option<u32>,
}

impl RetrySchedule {
    /// Creates a schedule clamped at `max`, optionally capped at
    /// `max_retries` attempts
    pub fn new(max: Duration, max_retries: Option<u32>) -> Self {
        Self {
            attempts: AtomicU32::new(0),
            pending: AtomicBool::new(false),
            base: BASE_DELAY,
            max,
            max_retries,
        }
    }

    /// Delay for the next retry given the attempts so far
    pub fn next_delay(&self) -> Duration {
        let doublings = self.attempts.load(Ordering::Acquire).min(MAX_DOUBLINGS);
        let delay = self.base.saturating_mul(1u32 << doublings);
        delay.min(self.max)
    }

    /// Marks one attempt; returns the attempt number (1-based)
    pub fn record_attempt(&self) -> u32 {
        self.attempts.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Whether the configured retry cap has been reached
    pub fn exhausted(&self) -> bool {
        self.max_retries
            .is_some_and(|cap| self.attempts.load(Ordering::Acquire) >= cap)
    }

    /// Resets the attempt counter (on successful init or sync)
    pub fn reset(&self) {
        self.attempts.store(0, Ordering::Release);
    }

    /// Claims the single pending-retry slot; `false` if one is already
    /// scheduled
    pub fn try_begin(&self) -> bool {
        self.pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Releases the pending-retry slot
    pub fn end_pending(&self) {
        self.pending.store(false, Ordering::Release);
    }

    /// Whether a retry is currently scheduled
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Attempts recorded since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Acquire)
    }
}
