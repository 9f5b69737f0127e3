// ============================================
// File: crates/corelink-service/src/services/assembler.rs
// ============================================
//! # Frame Assembler
//!
//! ## Creation Reason
//! Turns the scheduler's marks into one plaintext batch and removes the
//! folded messages from the queue.
//!
//! ## Main Functionality
//! - `assemble`: concatenates marked messages in queue order
//! - `Batch`: plaintext plus accumulated priority and minimum deadline
//! - `fits_full_notification`: wire bound for full traffic notifications
//!
//! ## ⚠️ Important Note for Next Developer
//! - Only call after `select_messages` returned `Ready`
//! - Unmarked messages keep their relative order
//!
//! ## Last Modified
//! v0.1.0 - Initial assembler

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use tokio::time::Instant;

use corelink_core::protocol::messages::MAX_MESSAGE_SIZE;

use crate::services::neighbour::MessageEntry;

/// Fixed part of a traffic notification (peer, distance, latency, header).
pub const TRAFFIC_NOTIFICATION_OVERHEAD: usize = 4 + 32 + 4 + 8;

/// One frame's worth of plaintext.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Concatenated messages
    pub plaintext: Bytes,
    /// Sum of message priorities, saturating
    pub priority: u32,
    /// Earliest message deadline
    pub deadline: Instant,
    /// Individual messages, for outbound notifications
    pub messages: Vec<Bytes>,
}

/// `true` if a message of `size` bytes can be copied into a full
/// traffic notification; larger ones are reported header-only.
#[must_use]
pub const fn fits_full_notification(size: usize) -> bool {
    size < MAX_MESSAGE_SIZE - TRAFFIC_NOTIFICATION_OVERHEAD
}

/// Folds every marked entry into a [`Batch`], removing it from `queue`.
///
/// Returns `None` if nothing is marked.
pub fn assemble(queue: &mut VecDeque<MessageEntry>) -> Option<Batch> {
    let size: usize = queue
        .iter()
        .filter(|e| e.do_transmit)
        .map(MessageEntry::size)
        .sum();
    if size == 0 {
        return None;
    }

    let mut plaintext = BytesMut::with_capacity(size);
    let mut priority = 0u32;
    let mut deadline: Option<Instant> = None;
    let mut messages = Vec::new();

    let mut kept = VecDeque::with_capacity(queue.len());
    for entry in queue.drain(..) {
        if !entry.do_transmit {
            kept.push_back(entry);
            continue;
        }
        plaintext.extend_from_slice(&entry.payload);
        priority = priority.saturating_add(entry.priority);
        deadline = Some(deadline.map_or(entry.deadline, |d| d.min(entry.deadline)));
        messages.push(entry.payload);
    }
    *queue = kept;

    deadline.map(|deadline| Batch {
        plaintext: plaintext.freeze(),
        priority,
        deadline,
        messages,
    })
}
