// ============================================
// File: crates/corelink-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! Narrow interfaces between the link layer and whatever moves bytes.
//!
//! ## Main Functionality
//! - `Transport`: synchronous request/cancel/quota calls made from inside
//!   the link layer's state machine
//! - `Link`: async event source and frame sink used by the service driver
//! - `TransportEvent`: connect, disconnect, inbound frame, readiness
//!
//! ## Design Philosophy
//! - `Transport` methods never block; readiness arrives later as an event
//! - `Link` is async with `async_trait`, like any other I/O seam
//! - Implementations must be `Send + Sync`
//!
//! ## ⚠️ Important Note for Next Developer
//! - A handle is only valid until its `TransmitReady`/`TransmitFailed`
//!   event is delivered or it is cancelled
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use corelink_common::PeerId;

use crate::error::Result;

// ============================================
// TransmitHandle
// ============================================

/// Identifies one outstanding transmit request.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransmitHandle(u64);

impl TransmitHandle {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TransmitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransmitHandle(#{})", self.0)
    }
}

// ============================================
// PerformanceHint
// ============================================

/// One (type, value) performance record reported by a transport,
/// e.g. distance or latency. Opaque to the link layer, which only
/// stores and forwards them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceHint {
    /// Property identifier
    pub kind: u32,
    /// Property value
    pub value: u32,
}

// ============================================
// TransportEvent
// ============================================

/// Something the transport wants the link layer to know.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A direct link to `peer` came up.
    Connected {
        /// Remote peer
        peer: PeerId,
        /// Link properties
        hints: Vec<PerformanceHint>,
    },
    /// The link to `peer` went away.
    Disconnected {
        /// Remote peer
        peer: PeerId,
    },
    /// An encrypted frame arrived.
    Received {
        /// Sender
        peer: PeerId,
        /// Raw frame bytes
        frame: Bytes,
        /// Link properties at receive time
        hints: Vec<PerformanceHint>,
    },
    /// A request made with `request_transmit` may now send.
    TransmitReady {
        /// Destination
        peer: PeerId,
        /// Request being granted
        handle: TransmitHandle,
        /// Maximum frame size accepted for this grant
        capacity: usize,
    },
    /// A request timed out or the link failed before it could be granted.
    TransmitFailed {
        /// Destination
        peer: PeerId,
        /// Request that failed
        handle: TransmitHandle,
    },
}

// ============================================
// Transport Trait
// ============================================

/// Transmission control offered by a transport.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; the link layer keeps them in an
/// `Arc` and calls them from its single event loop.
pub trait Transport: Send + Sync {
    /// Asks for permission to send `size` bytes to `peer`.
    ///
    /// Returns `None` if the request is refused outright (duplicate
    /// request for the peer, size not supported, link gone). A zero
    /// `size` is a bare connection hint.
    fn request_transmit(
        &self,
        peer: &PeerId,
        size: usize,
        priority: u32,
        timeout: Duration,
    ) -> Option<TransmitHandle>;

    /// Withdraws an outstanding request; no event is delivered for it.
    fn cancel(&self, handle: TransmitHandle);

    /// Tells the transport the inbound and outbound quota for `peer`
    /// in bytes per second.
    fn set_quota(&self, peer: &PeerId, bw_in: u32, bw_out: u32);
}

// ============================================
// Link Trait
// ============================================

/// Event stream and frame sink of a transport.
#[async_trait]
pub trait Link: Send + Sync {
    /// Waits for the next transport event.
    ///
    /// # Errors
    /// `ShuttingDown` once the transport is closed.
    async fn next_event(&self) -> Result<TransportEvent>;

    /// Sends a frame under a granted request.
    ///
    /// # Errors
    /// `NotConnected` if the link vanished in between.
    async fn send(&self, peer: &PeerId, frame: Bytes) -> Result<()>;

    /// Stops delivering events.
    ///
    /// # Errors
    /// Implementation specific.
    async fn shutdown(&self) -> Result<()>;
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transmit_handle_debug() {
        let handle = TransmitHandle::new(42);
        assert_eq!(handle.id(), 42);
        assert_eq!(format!("{handle:?}"), "TransmitHandle(#42)");
    }
}
