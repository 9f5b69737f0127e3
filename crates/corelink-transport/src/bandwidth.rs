// ============================================
// File: crates/corelink-transport/src/bandwidth.rs
// ============================================
//! # Bandwidth Tracking
//!
//! ## Creation Reason
//! Outbound traffic to a neighbour is paced by a byte budget that refills
//! at the negotiated rate. The scheduler asks how many bytes are available
//! now and how many will be by a given deadline.
//!
//! ## Main Functionality
//! - `BandwidthTracker`: budget queries and consumption
//! - `WindowTracker`: token-bucket style tracker with bounded carry-over
//! - `bytes_for` / `delay_for`: rate arithmetic shared with the scheduler
//!
//! ## Accounting Model
//! ```text
//! consumption < 0   → unused credit (capped at rate × max_carry_secs)
//! consumption > 0   → overdraft, repaid as time passes
//! available         = -consumption
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Time is always passed in explicitly; nothing here reads a clock
//! - A rate of zero means "never": delays come back as `Duration::MAX`
//!
//! ## Last Modified
//! v0.1.0 - Initial tracker

use std::time::Duration;

use tokio::time::Instant;

/// Default number of seconds of unused bandwidth that may be carried over.
pub const DEFAULT_MAX_CARRY_SECS: u32 = 300;

// ============================================
// Rate Arithmetic
// ============================================

/// Bytes a rate of `bytes_per_second` supplies over `duration`, rounded.
#[must_use]
pub fn bytes_for(bytes_per_second: u32, duration: Duration) -> u64 {
    let bytes = (u128::from(bytes_per_second) * duration.as_micros() + 500_000) / 1_000_000;
    u64::try_from(bytes).unwrap_or(u64::MAX)
}

/// Time a rate of `bytes_per_second` needs to supply `bytes`.
#[must_use]
pub fn delay_for(bytes_per_second: u32, bytes: u64) -> Duration {
    if bytes_per_second == 0 {
        return Duration::MAX;
    }
    let micros = u128::from(bytes) * 1_000_000 / u128::from(bytes_per_second);
    Duration::from_micros(u64::try_from(micros).unwrap_or(u64::MAX))
}

// ============================================
// BandwidthTracker Trait
// ============================================

/// Byte budget that refills over time.
pub trait BandwidthTracker: Send {
    /// Bytes that may be sent right now; negative while in overdraft.
    fn available_now(&mut self, now: Instant) -> i64;

    /// Charges `bytes` (negative values return credit). Returns `true`
    /// if the tracker is now in overdraft.
    fn consume(&mut self, now: Instant, bytes: i64) -> bool;

    /// Bytes the configured rate supplies within `delay`.
    fn bytes_available_by(&self, delay: Duration) -> u64;

    /// How long until `bytes` can be sent without overdraft.
    fn delay_until_available(&mut self, now: Instant, bytes: u64) -> Duration;

    /// Changes the refill rate, settling the budget at the old rate first.
    fn update_quota(&mut self, now: Instant, bytes_per_second: u32);

    /// Current refill rate in bytes per second.
    fn quota(&self) -> u32;
}

// ============================================
// WindowTracker
// ============================================

/// Tracker with a bounded amount of carry-over credit.
///
/// # Example
/// ```
/// use corelink_transport::bandwidth::{BandwidthTracker, WindowTracker};
/// use std::time::Duration;
/// use tokio::time::Instant;
///
/// let start = Instant::now();
/// let mut tracker = WindowTracker::new(start, 1000, 10);
/// assert_eq!(tracker.available_now(start), 0);
/// assert_eq!(tracker.available_now(start + Duration::from_secs(2)), 2000);
/// ```
#[derive(Debug, Clone)]
pub struct WindowTracker {
    consumption: i64,
    last_update: Instant,
    bytes_per_second: u32,
    max_carry_secs: u32,
}

impl WindowTracker {
    /// Creates a tracker with an empty budget at `now`.
    #[must_use]
    pub fn new(now: Instant, bytes_per_second: u32, max_carry_secs: u32) -> Self {
        Self {
            consumption: 0,
            last_update: now,
            bytes_per_second,
            max_carry_secs,
        }
    }

    fn max_carry(&self) -> i64 {
        i64::from(self.bytes_per_second) * i64::from(self.max_carry_secs)
    }

    fn settle(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_update);
        let accrued = i64::try_from(bytes_for(self.bytes_per_second, elapsed)).unwrap_or(i64::MAX);
        self.consumption = self.consumption.saturating_sub(accrued).max(-self.max_carry());
        self.last_update = now;
    }
}

impl BandwidthTracker for WindowTracker {
    fn available_now(&mut self, now: Instant) -> i64 {
        self.settle(now);
        -self.consumption
    }

    fn consume(&mut self, now: Instant, bytes: i64) -> bool {
        self.settle(now);
        self.consumption = self.consumption.saturating_add(bytes);
        self.consumption > 0
    }

    fn bytes_available_by(&self, delay: Duration) -> u64 {
        bytes_for(self.bytes_per_second, delay)
    }

    fn delay_until_available(&mut self, now: Instant, bytes: u64) -> Duration {
        if self.bytes_per_second == 0 {
            return Duration::MAX;
        }
        self.settle(now);
        let missing = i128::from(bytes) + i128::from(self.consumption);
        if missing <= 0 {
            return Duration::ZERO;
        }
        delay_for(
            self.bytes_per_second,
            u64::try_from(missing).unwrap_or(u64::MAX),
        )
    }

    fn update_quota(&mut self, now: Instant, bytes_per_second: u32) {
        self.settle(now);
        self.bytes_per_second = bytes_per_second;
        self.consumption = self.consumption.max(-self.max_carry());
    }

    fn quota(&self) -> u32 {
        self.bytes_per_second
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_arithmetic() {
        assert_eq!(bytes_for(1000, Duration::from_millis(1500)), 1500);
        assert_eq!(bytes_for(0, Duration::from_secs(10)), 0);
        assert_eq!(delay_for(1000, 250), Duration::from_millis(250));
        assert_eq!(delay_for(0, 1), Duration::MAX);
    }

    #[test]
    fn test_tracker_refills_over_time() {
        let start = Instant::now();
        let mut tracker = WindowTracker::new(start, 1000, 10);
        assert_eq!(tracker.available_now(start), 0);
        assert_eq!(tracker.available_now(start + Duration::from_millis(500)), 500);
    }

    #[test]
    fn test_tracker_carry_is_bounded() {
        let start = Instant::now();
        let mut tracker = WindowTracker::new(start, 1000, 2);
        assert_eq!(tracker.available_now(start + Duration::from_secs(60)), 2000);
    }

    #[test]
    fn test_tracker_consume_and_overdraft() {
        let start = Instant::now();
        let mut tracker = WindowTracker::new(start, 1000, 10);
        let later = start + Duration::from_secs(1);
        assert!(!tracker.consume(later, 600));
        assert_eq!(tracker.available_now(later), 400);
        assert!(tracker.consume(later, 600));
        assert_eq!(tracker.available_now(later), -200);
        assert!(!tracker.consume(later, -300));
    }

    #[test]
    fn test_tracker_delay_until_available() {
        let start = Instant::now();
        let mut tracker = WindowTracker::new(start, 1000, 10);
        assert_eq!(
            tracker.delay_until_available(start, 250),
            Duration::from_millis(250)
        );
        let later = start + Duration::from_secs(1);
        assert_eq!(tracker.delay_until_available(later, 250), Duration::ZERO);

        let mut stalled = WindowTracker::new(start, 0, 10);
        assert_eq!(stalled.delay_until_available(start, 1), Duration::MAX);
    }

    #[test]
    fn test_tracker_update_quota_settles_first() {
        let start = Instant::now();
        let mut tracker = WindowTracker::new(start, 1000, 10);
        let later = start + Duration::from_secs(1);
        tracker.update_quota(later, 10);
        assert_eq!(tracker.quota(), 10);
        assert_eq!(tracker.available_now(later), 100);
        assert_eq!(tracker.bytes_available_by(Duration::from_secs(3)), 30);
    }
}
