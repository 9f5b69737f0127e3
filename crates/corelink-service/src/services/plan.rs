// ============================================
// File: crates/corelink-service/src/services/plan.rs
// ============================================
//! # Plaintext Scheduler
//!
//! ## Creation Reason
//! Decides which queued messages go into the next frame. It must meet
//! deadlines with the bandwidth the neighbour allows, shed low-priority
//! load when that is impossible, and avoid sending near-empty frames when
//! nothing is urgent.
//!
//! ## Main Functionality
//! - `select_messages`: marks `do_transmit` on a prefix-respecting subset
//! - `discard_expired`: removes messages too far past their deadline
//! - `PlanParams` / `Selection`
//!
//! ## Selection Algorithm
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ repeat                                                       │
//! │   avail ← tracker.available_now; t ← now; slack ← cork max   │
//! │   walk queue (skip excluded) while looked-at bytes < 2·S     │
//! │     t ← deadline, avail += bandwidth accrued in between      │
//! │     avail < size  → infeasible                               │
//! │     else avail -= size, shrink slack                         │
//! │     remember lowest priority seen (last one on ties)         │
//! │   infeasible → exclude lowest priority, repeat               │
//! │ slack > 0 ∧ looked-at < S/4 ∧ 2 free slots → cork            │
//! │ else greedily mark what fits into S, in queue order          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `got_slack` is granted once per message, so corking can delay a
//!   message by at most `max_cork_delay`
//! - Exclusion is local to one call; excluded messages stay queued
//! - Selected messages keep queue order; the assembler depends on it
//!
//! ## Last Modified
//! v0.1.0 - Initial scheduler

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use corelink_transport::bandwidth::delay_for;
use corelink_transport::BandwidthTracker;

use crate::services::neighbour::MessageEntry;
use crate::timers::deadline_after;

/// Smallest retry delay handed back when waiting for bandwidth.
pub const MIN_RETRY_DELAY: Duration = Duration::from_millis(1);

/// Scheduler knobs.
#[derive(Debug, Clone, Copy)]
pub struct PlanParams {
    /// Largest plaintext a frame may carry (`S`)
    pub frame_budget: usize,
    /// Longest a message may be held back to fill a frame
    pub max_cork_delay: Duration,
    /// Plaintext queue bound
    pub max_queue: usize,
}

/// Outcome of [`select_messages`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// `bytes` worth of messages are marked.
    Ready {
        /// Sum of marked payload sizes
        bytes: usize,
    },
    /// Frame would be underfull and nothing is urgent.
    Corked {
        /// Try again after this delay
        retry: Duration,
    },
    /// Nothing can be sent with the bandwidth available now.
    Wait {
        /// Try again after this delay
        retry: Duration,
    },
    /// Queue is empty.
    Idle,
}

/// Removes messages whose deadline passed more than `grace` ago.
///
/// Returns the number of messages removed.
pub fn discard_expired(queue: &mut VecDeque<MessageEntry>, now: Instant, grace: Duration) -> usize {
    let before = queue.len();
    queue.retain(|entry| now.saturating_duration_since(entry.deadline) <= grace);
    before - queue.len()
}

/// Marks the messages to put into the next frame.
///
/// `tracker` is the neighbour's outbound budget and supplies the refill
/// between deadlines; `bw_out` bounds the cork slack.
pub fn select_messages(
    queue: &mut VecDeque<MessageEntry>,
    tracker: &mut dyn BandwidthTracker,
    bw_out: u32,
    now: Instant,
    params: &PlanParams,
) -> Selection {
    if queue.is_empty() {
        return Selection::Idle;
    }
    let budget = params.frame_budget;
    let mut excluded = vec![false; queue.len()];

    let mut looked_at;
    let mut last;
    let mut slack;
    loop {
        let mut avail = u64::try_from(tracker.available_now(now).max(0)).unwrap_or(0);
        let mut t = now;
        let mut infeasible = false;
        let mut min: Option<(usize, u32)> = None;
        looked_at = 0usize;
        slack = params.max_cork_delay;

        let mut idx = 0;
        while idx < queue.len() && looked_at < budget.saturating_mul(2) {
            if excluded[idx] {
                idx += 1;
                continue;
            }
            let entry = &mut queue[idx];
            let size = entry.size() as u64;
            if !infeasible {
                let delta = entry.deadline.saturating_duration_since(t);
                if !delta.is_zero() {
                    t = entry.deadline;
                    avail = avail.saturating_add(tracker.bytes_available_by(delta));
                }
                if avail < size {
                    infeasible = true;
                } else {
                    avail -= size;
                    slack = slack.min(delay_for(bw_out, avail));
                    if entry.deadline <= now {
                        slack = Duration::ZERO;
                    } else if entry.got_slack {
                        slack = slack.min(entry.slack_deadline.saturating_duration_since(now));
                    } else {
                        slack = slack.min(entry.deadline.saturating_duration_since(now));
                        entry.got_slack = true;
                        entry.slack_deadline =
                            entry.deadline.min(deadline_after(now, params.max_cork_delay));
                    }
                }
            }
            looked_at += entry.size();
            t = t.max(entry.deadline);
            if min.map_or(true, |(_, prio)| entry.priority <= prio) {
                min = Some((idx, entry.priority));
            }
            idx += 1;
        }
        last = idx;

        match (infeasible, min) {
            (true, Some((victim, priority))) => {
                trace!(priority, "Excluding lowest priority message from this round");
                excluded[victim] = true;
            }
            _ => break,
        }
    }

    for entry in queue.iter_mut() {
        entry.do_transmit = false;
    }

    if !slack.is_zero()
        && budget > looked_at.saturating_mul(4)
        && queue.len() + 2 <= params.max_queue
    {
        trace!(
            looked_at,
            budget,
            slack_ms = slack.as_millis() as u64,
            "Corking underfull frame"
        );
        return Selection::Corked {
            retry: params.max_cork_delay,
        };
    }

    let mut remaining = budget;
    let mut selected = 0usize;
    for (idx, entry) in queue.iter_mut().enumerate().take(last) {
        if !excluded[idx] && entry.size() <= remaining {
            entry.do_transmit = true;
            remaining -= entry.size();
            selected += entry.size();
        }
    }

    if selected == 0 {
        let head = queue.front().map_or(0, MessageEntry::size) as u64;
        let retry = tracker.delay_until_available(now, head).max(MIN_RETRY_DELAY);
        return Selection::Wait { retry };
    }
    Selection::Ready { bytes: selected }
}

// ============================================
// Tests
// ============================================
