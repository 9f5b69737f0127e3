// ============================================
// File: crates/corelink-transport/src/memory.rs
// ============================================
//! # In-Memory Transport
//!
//! ## Creation Reason
//! Runs the link layer without any network: frames sent to a linked
//! `MemoryTransport` show up as `Received` events on the other side.
//! Used by tests and by the daemon when no real transport is configured.
//!
//! ## Main Functionality
//! - Event inbox (`parking_lot` queue + `tokio::sync::Notify`)
//! - One outstanding request per peer, granted immediately or by hand
//! - Records requests, cancellations, quotas and sent frames
//! - `connect`/`disconnect` to wire two instances together
//!
//! ## Usage in Tests
//! ```
//! use corelink_common::PeerId;
//! use corelink_transport::{MemoryTransport, Transport};
//! use std::time::Duration;
//!
//! let transport = MemoryTransport::new(PeerId::random());
//! let peer = PeerId::random();
//! assert!(transport.request_transmit(&peer, 100, 1, Duration::from_secs(1)).is_some());
//! transport.set_auto_ready(false);
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Queues are unbounded; this is not a flow-controlled transport
//! - With auto-ready on, a request is granted (and closed) as it is made
//!
//! ## Last Modified
//! v0.1.0 - Initial in-memory transport

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace};

use corelink_common::PeerId;

use crate::error::{Result, TransportError};
use crate::traits::{Link, TransmitHandle, Transport, TransportEvent};

/// Largest frame a `MemoryTransport` accepts by default.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

// ============================================
// Inbox
// ============================================

#[derive(Default)]
struct Inbox {
    events: Mutex<VecDeque<TransportEvent>>,
    notify: Notify,
    closed: AtomicBool,
}

impl Inbox {
    fn push(&self, event: TransportEvent) {
        self.events.lock().push_back(event);
        self.notify.notify_one();
    }
}

// ============================================
// Recorded Requests
// ============================================

/// A transmit request as seen by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmitRequest {
    /// Destination
    pub peer: PeerId,
    /// Handle returned to the caller
    pub handle: TransmitHandle,
    /// Requested frame size
    pub size: usize,
    /// Requested priority
    pub priority: u32,
    /// Requested timeout
    pub timeout: Duration,
}

// ============================================
// MemoryTransport
// ============================================

/// In-process transport.
pub struct MemoryTransport {
    local: PeerId,
    inbox: Arc<Inbox>,
    links: Mutex<HashMap<PeerId, Arc<Inbox>>>,
    pending: Mutex<HashMap<PeerId, TransmitRequest>>,
    next_handle: AtomicU64,
    auto_ready: AtomicBool,
    reject_next: AtomicUsize,
    max_frame_size: usize,
    requests: Mutex<Vec<TransmitRequest>>,
    cancelled: Mutex<Vec<TransmitHandle>>,
    quotas: Mutex<HashMap<PeerId, (u32, u32)>>,
    sent: Mutex<Vec<(PeerId, Bytes)>>,
}

impl MemoryTransport {
    /// Creates a transport for the node `local`, granting requests
    /// immediately.
    #[must_use]
    pub fn new(local: PeerId) -> Self {
        Self {
            local,
            inbox: Arc::new(Inbox::default()),
            links: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            auto_ready: AtomicBool::new(true),
            reject_next: AtomicUsize::new(0),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            requests: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            quotas: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Identity this transport delivers frames from.
    #[must_use]
    pub const fn local_peer(&self) -> PeerId {
        self.local
    }

    // ========================================
    // Wiring
    // ========================================

    /// Links two transports and raises `Connected` on both sides.
    pub fn connect(a: &Self, b: &Self) {
        a.links.lock().insert(b.local, Arc::clone(&b.inbox));
        b.links.lock().insert(a.local, Arc::clone(&a.inbox));
        a.inbox.push(TransportEvent::Connected {
            peer: b.local,
            hints: Vec::new(),
        });
        b.inbox.push(TransportEvent::Connected {
            peer: a.local,
            hints: Vec::new(),
        });
    }

    /// Removes the link and raises `Disconnected` on both sides.
    pub fn disconnect(a: &Self, b: &Self) {
        a.links.lock().remove(&b.local);
        b.links.lock().remove(&a.local);
        a.inbox.push(TransportEvent::Disconnected { peer: b.local });
        b.inbox.push(TransportEvent::Disconnected { peer: a.local });
    }

    /// Queues an arbitrary event for `next_event`.
    pub fn inject(&self, event: TransportEvent) {
        self.inbox.push(event);
    }

    // ========================================
    // Behaviour Knobs
    // ========================================

    /// Grant requests as they are made (default) or only via [`Self::grant`].
    pub fn set_auto_ready(&self, enabled: bool) {
        self.auto_ready.store(enabled, Ordering::Release);
    }

    /// Refuse the next `count` transmit requests.
    pub fn reject_next(&self, count: usize) {
        self.reject_next.store(count, Ordering::Release);
    }

    /// Grants the outstanding request for `peer`, if any.
    pub fn grant(&self, peer: &PeerId) -> Option<TransmitHandle> {
        let request = self.pending.lock().remove(peer)?;
        self.inbox.push(TransportEvent::TransmitReady {
            peer: request.peer,
            handle: request.handle,
            capacity: request.size,
        });
        Some(request.handle)
    }

    /// Fails the outstanding request for `peer`, if any.
    pub fn fail(&self, peer: &PeerId) -> Option<TransmitHandle> {
        let request = self.pending.lock().remove(peer)?;
        self.inbox.push(TransportEvent::TransmitFailed {
            peer: request.peer,
            handle: request.handle,
        });
        Some(request.handle)
    }

    // ========================================
    // Inspection
    // ========================================

    /// Every request accepted so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<TransmitRequest> {
        self.requests.lock().clone()
    }

    /// Handles cancelled so far.
    #[must_use]
    pub fn cancelled(&self) -> Vec<TransmitHandle> {
        self.cancelled.lock().clone()
    }

    /// Requests not yet granted, failed or cancelled.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Last quota pushed for `peer` as `(bw_in, bw_out)`.
    #[must_use]
    pub fn quota(&self, peer: &PeerId) -> Option<(u32, u32)> {
        self.quotas.lock().get(peer).copied()
    }

    /// Takes all frames sent so far.
    #[must_use]
    pub fn take_sent(&self) -> Vec<(PeerId, Bytes)> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Events waiting in the inbox.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.inbox.events.lock().len()
    }
}

impl Transport for MemoryTransport {
    fn request_transmit(
        &self,
        peer: &PeerId,
        size: usize,
        priority: u32,
        timeout: Duration,
    ) -> Option<TransmitHandle> {
        let rejected = self
            .reject_next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            debug!(peer = ?peer, size, "Refusing transmit request on request");
            return None;
        }
        if size > self.max_frame_size {
            debug!(peer = ?peer, size, "Refusing oversized transmit request");
            return None;
        }

        let mut pending = self.pending.lock();
        if pending.contains_key(peer) {
            debug!(peer = ?peer, "Refusing duplicate transmit request");
            return None;
        }
        let handle = TransmitHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let request = TransmitRequest {
            peer: *peer,
            handle,
            size,
            priority,
            timeout,
        };
        self.requests.lock().push(request);
        trace!(peer = ?peer, size, priority, ?handle, "Transmit request accepted");

        if self.auto_ready.load(Ordering::Acquire) {
            drop(pending);
            self.inbox.push(TransportEvent::TransmitReady {
                peer: *peer,
                handle,
                capacity: size,
            });
        } else {
            pending.insert(*peer, request);
        }
        Some(handle)
    }

    fn cancel(&self, handle: TransmitHandle) {
        self.pending.lock().retain(|_, r| r.handle != handle);
        self.inbox.events.lock().retain(|event| {
            !matches!(event, TransportEvent::TransmitReady { handle: h, .. } if *h == handle)
        });
        self.cancelled.lock().push(handle);
    }

    fn set_quota(&self, peer: &PeerId, bw_in: u32, bw_out: u32) {
        self.quotas.lock().insert(*peer, (bw_in, bw_out));
    }
}

#[async_trait]
impl Link for MemoryTransport {
    async fn next_event(&self) -> Result<TransportEvent> {
        loop {
            if let Some(event) = self.inbox.events.lock().pop_front() {
                return Ok(event);
            }
            if self.inbox.closed.load(Ordering::Acquire) {
                return Err(TransportError::ShuttingDown);
            }
            self.inbox.notify.notified().await;
        }
    }

    async fn send(&self, peer: &PeerId, frame: Bytes) -> Result<()> {
        if self.inbox.closed.load(Ordering::Acquire) {
            return Err(TransportError::ShuttingDown);
        }
        let remote = self.links.lock().get(peer).cloned();
        if let Some(remote) = remote {
            remote.push(TransportEvent::Received {
                peer: self.local,
                frame: frame.clone(),
                hints: Vec::new(),
            });
        }
        self.sent.lock().push((*peer, frame));
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.inbox.closed.store(true, Ordering::Release);
        self.inbox.notify.notify_waiters();
        Ok(())
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("local", &self.local)
            .field("links", &self.links.lock().len())
            .field("pending_requests", &self.pending_count())
            .field("pending_events", &self.pending_events())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
