// ============================================
// File: crates/corelink-service/src/services/preference.rs
// ============================================
//! # Preference & Quota
//!
//! ## Creation Reason
//! Clients express how much they care about a neighbour; the inbound
//! quota each neighbour gets is the guaranteed minimum plus a share of
//! the remaining node-wide budget proportional to that preference.
//!
//! ## Main Functionality
//! - `PreferenceSum`: node-wide total with overflow compensation
//! - `inbound_quota`: per-neighbour inbound bandwidth
//! - `is_idle`: the "force quota to zero" test
//!
//! ## ⚠️ Important Note for Next Developer
//! - On overflow every preference is halved and the sum rebuilt; the
//!   relative weights survive, the absolute values do not
//!
//! ## Last Modified
//! v0.1.0 - Initial preference bookkeeping

use std::time::Duration;

use tokio::time::Instant;

/// Node-wide sum of neighbour preferences.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PreferenceSum(u64);

impl PreferenceSum {
    /// Empty sum.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Current total.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.0
    }

    /// Adds `inc`; on overflow halves every preference in `prefs` and
    /// rebuilds the total from them. Returns `true` if halving happened.
    pub fn add<'a>(&mut self, inc: u64, prefs: impl Iterator<Item = &'a mut u64>) -> bool {
        if let Some(total) = self.0.checked_add(inc) {
            self.0 = total;
            return false;
        }
        self.decay(prefs);
        true
    }

    /// Halves every preference and rebuilds the total.
    pub fn decay<'a>(&mut self, prefs: impl Iterator<Item = &'a mut u64>) {
        self.0 = prefs.fold(0u64, |sum, pref| {
            *pref /= 2;
            sum.saturating_add(*pref)
        });
    }

    /// Removes a departing neighbour's preference.
    pub fn remove(&mut self, pref: u64) {
        self.0 = self.0.saturating_sub(pref);
    }
}

/// Adds `change` to a preference, capping instead of wrapping.
#[must_use]
pub const fn apply_change(current: u64, change: u64) -> u64 {
    current.saturating_add(change)
}

/// Inputs of [`inbound_quota`].
#[derive(Debug, Clone, Copy)]
pub struct QuotaInputs {
    /// This neighbour's preference
    pub preference: u64,
    /// Sum over all neighbours
    pub preference_sum: u64,
    /// Number of neighbours
    pub neighbour_count: usize,
    /// Node-wide outbound target, bytes per second
    pub total_out: u64,
    /// Guaranteed inbound bandwidth per neighbour
    pub min_per_peer: u32,
}

/// Inbound quota: `min + (total − min·count) · pref / sum`, capped at
/// `u32::MAX`. Uses `1 / count` as the share when the sum is zero.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn inbound_quota(inputs: &QuotaInputs) -> u32 {
    let count = inputs.neighbour_count.max(1) as u64;
    let pref_rel = if inputs.preference_sum == 0 {
        1.0 / count as f64
    } else {
        inputs.preference as f64 / inputs.preference_sum as f64
    };
    let need_per_peer = u64::from(inputs.min_per_peer);
    let distributable = inputs
        .total_out
        .saturating_sub(need_per_peer.saturating_mul(count));
    let share = (distributable as f64 * pref_rel) as u64;
    u32::try_from(need_per_peer.saturating_add(share)).unwrap_or(u32::MAX)
}

/// `true` if nothing was heard since `idle_timeout` and the connection
/// is at least that old (or never came up).
#[must_use]
pub fn is_idle(
    now: Instant,
    last_activity: Instant,
    time_established: Option<Instant>,
    idle_timeout: Duration,
) -> bool {
    let quiet = now.saturating_duration_since(last_activity) > idle_timeout;
    let old = time_established.map_or(true, |t| now.saturating_duration_since(t) > idle_timeout);
    quiet && old
}
