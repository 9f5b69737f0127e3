// ============================================
// File: crates/corelink-service/src/error.rs
// ============================================
//! # Service Error Types
//!
//! ## Main Functionality
//! - `ServiceError`: everything the link-layer service can report
//! - Nested `CommonError` / `CoreError` / `TransportError` via `#[from]`
//! - Classifiers used by the driver to decide what to log and what to drop
//!
//! ## Last Modified
//! v0.1.0 - Initial service errors

use thiserror::Error;

use corelink_common::error::CommonError;
use corelink_common::PeerId;
use corelink_core::error::CoreError;
use corelink_transport::error::TransportError;

use crate::services::admission::ClientId;
use crate::services::handshake::HandshakeState;

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Service error types.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Configuration file could not be read or parsed.
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        /// Source path
        path: String,
        /// Parser or I/O message
        reason: String,
    },

    /// Configuration value out of range.
    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        /// Offending key
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// Identity key file unusable.
    #[error("Invalid key file '{path}': {reason}")]
    KeyFile {
        /// Key file path
        path: String,
        /// What is wrong with it
        reason: String,
    },

    /// The neighbour's plaintext queue has no free slot.
    #[error("Plaintext queue for {peer} is full (limit {limit})")]
    QueueFull {
        /// Destination
        peer: PeerId,
        /// Configured bound
        limit: usize,
    },

    /// Payload does not fit into a single frame.
    #[error("Message of {size} bytes exceeds frame budget of {max} bytes")]
    MessageTooLarge {
        /// Payload size
        size: usize,
        /// Largest payload a frame can carry
        max: usize,
    },

    /// Payload is not a well-formed message.
    #[error("Invalid message: {reason}")]
    InvalidMessage {
        /// What is wrong with it
        reason: String,
    },

    /// Client id was never registered or already disconnected.
    #[error("Unknown client {0}")]
    UnknownClient(ClientId),

    /// Client already has the maximum number of pending requests.
    #[error("Client {client} has {limit} pending requests")]
    ClientQueueFull {
        /// Requesting client
        client: ClientId,
        /// Configured bound
        limit: usize,
    },

    /// No neighbour entry for the peer.
    #[error("Neighbour not found: {0}")]
    NeighbourNotFound(PeerId),

    /// The session with the peer cannot carry this traffic yet.
    #[error("Session with {peer} not ready (state {state})")]
    SessionNotReady {
        /// Neighbour
        peer: PeerId,
        /// Its handshake state
        state: HandshakeState,
    },

    /// Request names our own identity where a remote peer is required.
    #[error("Operation not allowed on the local peer")]
    LocalPeer,

    /// Service failed to start.
    #[error("Service failed to start: {reason}")]
    StartupFailed {
        /// Cause
        reason: String,
    },

    /// Service is shutting down.
    #[error("Service is shutting down")]
    ShuttingDown,

    /// Internal invariant broken.
    #[error("Internal error: {message}")]
    Internal {
        /// Description
        message: String,
    },

    /// Error from the common crate.
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Error from the crypto / protocol crate.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error from the transport.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// Creates a `ConfigLoad` error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigInvalid` error.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `KeyFile` error.
    pub fn key_file(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::KeyFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidMessage` error.
    pub fn invalid_message(reason: impl Into<String>) -> Self {
        Self::InvalidMessage {
            reason: reason.into(),
        }
    }

    /// Creates a `StartupFailed` error.
    pub fn startup_failed(reason: impl Into<String>) -> Self {
        Self::StartupFailed {
            reason: reason.into(),
        }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Configuration problem.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. } | Self::ConfigInvalid { .. } | Self::KeyFile { .. }
        )
    }

    /// Backpressure the caller should answer by waiting for a grant.
    #[must_use]
    pub const fn is_backpressure(&self) -> bool {
        matches!(self, Self::QueueFull { .. } | Self::ClientQueueFull { .. })
    }

    /// Inbound fault that indicates tampering rather than loss.
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        match self {
            Self::Core(e) => e.is_suspicious(),
            _ => false,
        }
    }

    /// Errors that stop the process.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. }
                | Self::ConfigInvalid { .. }
                | Self::KeyFile { .. }
                | Self::StartupFailed { .. }
        )
    }

    /// Frame or message dropped because of a session problem rather
    /// than a local fault.
    #[must_use]
    pub const fn is_dropped_frame(&self) -> bool {
        match self {
            Self::Core(e) => e.is_protocol_error() || e.is_crypto_error(),
            Self::SessionNotReady { .. } => true,
            _ => false,
        }
    }

    /// Errors worth retrying later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::QueueFull { .. } | Self::ClientQueueFull { .. } => true,
            _ => false,
        }
    }
}
