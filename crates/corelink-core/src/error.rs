// ============================================
// File: crates/corelink-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Errors raised while building, sealing, opening and parsing frames.
//!
//! ## Error Categories
//! 1. **Crypto**: bad key bytes, seal failures, HMAC or AEAD rejection
//! 2. **Protocol**: bad layouts, frames outside the replay window, ancient
//!    timestamps
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material in error messages
//! - Inbound faults are counted and dropped by the caller; none of these
//!   errors is a reason to tear a session down on its own
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use corelink_common::error::CommonError;

/// Result type for framing and crypto.
pub type Result<T> = std::result::Result<T, CoreError>;

/// What can go wrong between a plaintext batch and an encrypted frame.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Crypto
    // ========================================

    /// Key bytes of the wrong shape.
    #[error("Invalid key: {context}")]
    InvalidKey {
        /// Which key and why
        context: String,
    },

    /// Sealing a frame failed.
    #[error("Encryption failed: {context}")]
    Encryption {
        /// Step that failed
        context: String,
    },

    /// The body did not decrypt under the derived nonce.
    #[error("Frame body failed to decrypt")]
    Decryption,

    /// The outer HMAC did not match.
    #[error("Frame authentication failed")]
    AuthenticationFailed,

    /// HKDF refused the requested output.
    #[error("Key derivation failed: {reason}")]
    KeyDerivation {
        /// HKDF message
        reason: String,
    },

    // ========================================
    // Protocol
    // ========================================

    /// A decoder was handed a message of another type.
    #[error("Expected message type {expected}, found {got}")]
    UnexpectedMessageType {
        /// Type found
        got: u16,
        /// Type wanted
        expected: u16,
    },

    /// Declared sizes or fields do not add up.
    #[error("Malformed message: {reason}")]
    MalformedMessage {
        /// What does not add up
        reason: String,
    },

    /// Fewer bytes than the fixed layout needs.
    #[error("Truncated message: need {expected} bytes, have {actual}")]
    MessageTooShort {
        /// Bytes needed
        expected: usize,
        /// Bytes present
        actual: usize,
    },

    /// More bytes than a frame may carry.
    #[error("Frame of {actual} bytes exceeds the {max} byte limit")]
    MessageTooLarge {
        /// Limit
        max: usize,
        /// Size seen
        actual: usize,
    },

    /// Sender timestamp too old.
    #[error("Ancient frame: {reason}")]
    InvalidTimestamp {
        /// Age check message
        reason: String,
    },

    /// Sequence number already accepted once.
    #[error("Duplicate frame: sequence number {sequence}")]
    DuplicateFrame {
        /// Repeated sequence number
        sequence: u32,
    },

    /// Sequence number behind the replay window.
    #[error("Stale frame: sequence {received} is too far behind {highest}")]
    ReplayDetected {
        /// Sequence number received
        received: u32,
        /// Highest sequence number accepted so far
        highest: u32,
    },

    /// Shared identity or encoding failure.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    /// Creates an `InvalidKey` error.
    pub fn invalid_key(context: impl Into<String>) -> Self {
        Self::InvalidKey {
            context: context.into(),
        }
    }

    /// Creates an `Encryption` error.
    pub fn encryption(context: impl Into<String>) -> Self {
        Self::Encryption {
            context: context.into(),
        }
    }

    /// Creates a `MalformedMessage` error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    /// Creates a `MessageTooShort` error.
    #[must_use]
    pub const fn too_short(expected: usize, actual: usize) -> Self {
        Self::MessageTooShort { expected, actual }
    }

    /// Creates a `MessageTooLarge` error.
    #[must_use]
    pub const fn too_large(max: usize, actual: usize) -> Self {
        Self::MessageTooLarge { max, actual }
    }

    /// Creates an `InvalidTimestamp` error.
    pub fn invalid_timestamp(reason: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            reason: reason.into(),
        }
    }

    /// Creates a `ReplayDetected` error.
    #[must_use]
    pub const fn replay(received: u32, highest: u32) -> Self {
        Self::ReplayDetected { received, highest }
    }

    /// Key handling, sealing or verification failed.
    #[must_use]
    pub const fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidKey { .. }
                | Self::Encryption { .. }
                | Self::Decryption
                | Self::AuthenticationFailed
                | Self::KeyDerivation { .. }
        )
    }

    /// The bytes or their place in the sequence are wrong.
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedMessageType { .. }
                | Self::MalformedMessage { .. }
                | Self::MessageTooShort { .. }
                | Self::MessageTooLarge { .. }
                | Self::InvalidTimestamp { .. }
                | Self::DuplicateFrame { .. }
                | Self::ReplayDetected { .. }
        )
    }

    /// Forged, replayed or ancient input. Plain duplicates are not
    /// suspicious since transports may deliver twice.
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        matches!(
            self,
            Self::Decryption
                | Self::AuthenticationFailed
                | Self::ReplayDetected { .. }
                | Self::InvalidTimestamp { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncation_message() {
        let err = CoreError::too_short(56, 12);
        assert!(err.to_string().contains("56"));
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn test_error_classification() {
        assert!(CoreError::AuthenticationFailed.is_crypto_error());
        assert!(CoreError::AuthenticationFailed.is_suspicious());
        assert!(CoreError::invalid_key("seed").is_crypto_error());

        let replay = CoreError::replay(3, 90);
        assert!(replay.is_protocol_error());
        assert!(replay.is_suspicious());

        let dup = CoreError::DuplicateFrame { sequence: 7 };
        assert!(dup.is_protocol_error());
        assert!(!dup.is_suspicious());
    }

    #[test]
    fn test_common_error_conversion() {
        let common = CommonError::invalid_length("session key", 32, 5);
        let core: CoreError = common.into();
        assert!(matches!(core, CoreError::Common(_)));
    }
}
