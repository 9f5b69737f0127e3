// ============================================
// File: crates/corelink-service/src/services/replay.rs
// ============================================
//! # Replay Window
//!
//! ## Creation Reason
//! Frames may be reordered by the transport, so the receiver accepts
//! sequence numbers slightly behind the highest seen while refusing any
//! number it has already accepted.
//!
//! ## Algorithm
//! ```text
//!   bit k set  <=>  (highest - k - 1) was accepted,   k in 0..32
//!
//!   seq == highest              -> Duplicate
//!   highest - seq > 32          -> TooOld
//!   seq <  highest, bit set     -> Duplicate
//!   seq <  highest, bit clear   -> Accept, set bit
//!   seq >  highest              -> Accept, shift window, remember old highest
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Reset the window whenever the peer's key changes
//! - Sequence numbers start at 1; a fresh window treats 0 as seen
//!
//! ## Last Modified
//! v0.1.0 - Initial replay window

/// How far behind the highest sequence number a frame may arrive.
pub const REPLAY_WINDOW_SIZE: u32 = 32;

/// Outcome of [`ReplayWindow::check_and_record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayCheckResult {
    /// Within the window and not seen before; now recorded.
    Accept,
    /// Ahead of the window; window advanced.
    AcceptAndAdvance,
    /// Already accepted once.
    Duplicate,
    /// Behind the window.
    TooOld,
}

impl ReplayCheckResult {
    /// `true` for both accepting outcomes.
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accept | Self::AcceptAndAdvance)
    }
}

/// 32-wide sliding window over received sequence numbers.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ReplayWindow {
    highest: u32,
    bitmap: u32,
}

impl ReplayWindow {
    /// Creates an empty window.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            highest: 0,
            bitmap: 0,
        }
    }

    /// Checks `seq` and records it if acceptable.
    pub fn check_and_record(&mut self, seq: u32) -> ReplayCheckResult {
        if seq == self.highest {
            return ReplayCheckResult::Duplicate;
        }

        if seq < self.highest {
            let behind = self.highest - seq;
            if behind > REPLAY_WINDOW_SIZE {
                return ReplayCheckResult::TooOld;
            }
            let bit = 1u32 << (behind - 1);
            if self.bitmap & bit != 0 {
                return ReplayCheckResult::Duplicate;
            }
            self.bitmap |= bit;
            return ReplayCheckResult::Accept;
        }

        let shift = seq - self.highest;
        self.bitmap = if shift > REPLAY_WINDOW_SIZE {
            0
        } else {
            // the previous highest moves into the bitmap
            self.bitmap.checked_shl(shift).unwrap_or(0) | (1u32 << (shift - 1))
        };
        self.highest = seq;
        ReplayCheckResult::AcceptAndAdvance
    }

    /// Highest accepted sequence number.
    #[must_use]
    pub const fn highest_seen(&self) -> u32 {
        self.highest
    }

    /// Forgets everything; used on key change.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl std::fmt::Debug for ReplayWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayWindow")
            .field("highest_seen", &self.highest)
            .field("bitmap", &format_args!("{:#034b}", self.bitmap))
            .finish()
    }
}
