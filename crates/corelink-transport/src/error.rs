// ============================================
// File: crates/corelink-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Failures reported by transport implementations to the link layer.
//!
//! ## ⚠️ Important Note for Next Developer
//! - A rejected transmit request is not an error: `request_transmit`
//!   returns `None` and the caller discards the frame
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;

use thiserror::Error;

use corelink_common::{CommonError, PeerId};

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Delivery Errors
    // ========================================

    /// No link to the peer exists.
    #[error("Peer {peer:?} is not connected")]
    NotConnected {
        /// Unreachable peer
        peer: PeerId,
    },

    /// Frame larger than the capacity granted for it.
    #[error("Frame of {size} bytes exceeds granted capacity {capacity}")]
    FrameTooLarge {
        /// Frame size
        size: usize,
        /// Granted capacity
        capacity: usize,
    },

    /// Transport is shutting down.
    #[error("Transport is shutting down")]
    ShuttingDown,

    // ========================================
    // Configuration / System Errors
    // ========================================

    /// Invalid transport configuration.
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig {
        /// Offending field
        field: String,
        /// What's wrong with it
        reason: String,
    },

    /// I/O error.
    #[error("I/O error: {context}")]
    Io {
        /// What was being done
        context: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl TransportError {
    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates an `InvalidConfig` error.
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if retrying later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NotConnected { .. } => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Returns `true` if the transport can no longer be used.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ShuttingDown | Self::InvalidConfig { .. })
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let peer = PeerId::new([1u8; 32]);
        assert!(TransportError::NotConnected { peer }.is_retryable());
        assert!(TransportError::ShuttingDown.is_fatal());
        assert!(!TransportError::FrameTooLarge { size: 10, capacity: 5 }.is_retryable());

        let blocked = TransportError::io("send", io::Error::from(io::ErrorKind::WouldBlock));
        assert!(blocked.is_retryable());
    }
}
