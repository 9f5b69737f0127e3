// ============================================
// File: crates/corelink-common/src/time.rs
// ============================================
//! # Wire Timestamps
//!
//! ## Creation Reason
//! Every encrypted frame carries the sender's wall-clock time so that the
//! receiver can reject ancient frames. Scheduling itself runs on the
//! monotonic tokio clock; this type is only for what goes on the wire and
//! for session-key creation times.
//!
//! ## Main Functionality
//! - `Timestamp`: microseconds since the Unix epoch, big-endian on the wire
//! - `TimestampError`: staleness check failures
//!
//! ## ⚠️ Important Note for Next Developer
//! - A clock before 1970 yields `Timestamp(0)` rather than a panic
//! - `age()` saturates at zero for timestamps in the future
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ============================================
// Timestamp
// ============================================

/// Absolute time in microseconds since the Unix epoch.
///
/// # Example
/// ```
/// use corelink_common::time::Timestamp;
/// use std::time::Duration;
///
/// let ts = Timestamp::now();
/// assert!(ts.age() < Duration::from_secs(1));
/// assert_eq!(Timestamp::from_be_bytes(ts.to_be_bytes()), ts);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp from raw microseconds.
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Returns the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(u64::try_from(since_epoch.as_micros()).unwrap_or(u64::MAX))
    }

    /// Returns the raw microsecond count.
    #[must_use]
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Network byte order encoding.
    #[must_use]
    pub const fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Decodes a network byte order timestamp.
    #[must_use]
    pub const fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }

    /// Time elapsed since this timestamp, zero if it lies in the future.
    #[must_use]
    pub fn age(&self) -> Duration {
        Duration::from_micros(Self::now().0.saturating_sub(self.0))
    }

    /// Rejects timestamps older than `max_age`.
    ///
    /// # Errors
    /// Returns `TimestampError::TooOld` when the age exceeds the bound.
    pub fn check_age(&self, max_age: Duration) -> Result<(), TimestampError> {
        let age = self.age();
        if age > max_age {
            return Err(TimestampError::TooOld {
                age_secs: age.as_secs(),
                max_secs: max_age.as_secs(),
            });
        }
        Ok(())
    }
}

impl From<u64> for Timestamp {
    fn from(micros: u64) -> Self {
        Self(micros)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

// ============================================
// TimestampError
// ============================================

/// Errors that can occur during timestamp validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimestampError {
    /// Timestamp is older than the accepted maximum age.
    #[error("Timestamp too old: {age_secs}s (max {max_secs}s)")]
    TooOld {
        /// Observed age in seconds
        age_secs: u64,
        /// Maximum accepted age in seconds
        max_secs: u64,
    },
}

// ============================================
// Tests
// ============================================
