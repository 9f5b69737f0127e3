// ============================================
// File: crates/corelink-service/src/timers.rs
// ============================================
//! # Timer Queue
//!
//! ## Creation Reason
//! The link layer never sleeps itself; it asks for "run task T after D"
//! and gets a handle it can cancel. The driver pops due tasks and feeds
//! them back into `CoreState`.
//!
//! ## Main Functionality
//! - `Scheduler`: `now` / `after` / `cancel` seam
//! - `TimerQueue`: ordered by (deadline, insertion sequence)
//! - `Task` / `TimerKind`: what to run when a timer fires
//!
//! ## ⚠️ Important Note for Next Developer
//! - Tasks with equal deadlines fire in scheduling order
//! - A popped task's handle is already dead; owners must clear their copy
//!   before running the task body
//!
//! ## Last Modified
//! v0.1.0 - Initial timer queue

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

use corelink_common::PeerId;

/// Used in place of "never" when a delay overflows the clock.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Adds `delay` to `now`, saturating at a far-future instant.
#[must_use]
pub fn deadline_after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay.min(FAR_FUTURE))
        .unwrap_or(now)
}

// ============================================
// Tasks
// ============================================

/// Per-neighbour callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Re-run plaintext scheduling (corking, bandwidth wait)
    RetryPlaintext,
    /// Retransmit the session key
    RetryHandshake,
    /// Send a keep-alive PING
    KeepAlive,
    /// Check whether the neighbour may be freed
    IdleEviction,
    /// Recompute the neighbour's inbound quota
    QuotaUpdate,
}

/// Work scheduled on the timer queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Callback owned by one neighbour.
    Neighbour {
        /// Owner
        peer: PeerId,
        /// Which callback
        kind: TimerKind,
    },
    /// Node-wide preference halving sweep.
    PreferenceDecay,
}

/// Cancellable reference to a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle {
    at: Instant,
    seq: u64,
}

impl TaskHandle {
    /// When the task is due.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.at
    }
}

// ============================================
// Scheduler Trait
// ============================================

/// Deferred execution service.
pub trait Scheduler {
    /// Current time.
    fn now(&self) -> Instant;

    /// Schedules `task` to run `delay` from now.
    fn after(&mut self, delay: Duration, task: Task) -> TaskHandle;

    /// Removes a scheduled task. Returns `false` if it already ran.
    fn cancel(&mut self, handle: TaskHandle) -> bool;
}

// ============================================
// TimerQueue
// ============================================

/// Deadline-ordered task queue on the tokio clock.
#[derive(Debug, Default)]
pub struct TimerQueue {
    tasks: BTreeMap<TaskHandle, Task>,
    next_seq: u64,
}

impl TimerQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.tasks.keys().next().map(TaskHandle::deadline)
    }

    /// Removes and returns the earliest task due at or before `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<(TaskHandle, Task)> {
        let (&handle, _) = self.tasks.iter().next()?;
        if handle.at > now {
            return None;
        }
        self.tasks.remove(&handle).map(|task| (handle, task))
    }

    /// Number of scheduled tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// `true` if nothing is scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// `true` if `handle` is still scheduled.
    #[must_use]
    pub fn contains(&self, handle: TaskHandle) -> bool {
        self.tasks.contains_key(&handle)
    }
}

impl Scheduler for TimerQueue {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn after(&mut self, delay: Duration, task: Task) -> TaskHandle {
        let handle = TaskHandle {
            at: deadline_after(self.now(), delay),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.tasks.insert(handle, task);
        handle
    }

    fn cancel(&mut self, handle: TaskHandle) -> bool {
        self.tasks.remove(&handle).is_some()
    }
}

// ============================================
// Tests
// ============================================
