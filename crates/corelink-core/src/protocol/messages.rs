// ============================================
// File: crates/corelink-core/src/protocol/messages.rs
// ============================================
//! # Protocol Message Definitions
//!
//! ## Creation Reason
//! Structures for the frame header and the two control messages the link
//! layer exchanges itself. Application messages are opaque here: only
//! their 4-byte header is interpreted.
//!
//! ## Message Sizes
//! | Message | Size (bytes) |
//! |---------|--------------|
//! | MessageHeader | 4 |
//! | EncryptedHeader | 56 |
//! | PingMessage | 44 |
//! | PongMessage | 48 |
//!
//! ## ⚠️ Important Note for Next Developer
//! - Field order is the wire order
//! - `size` fields always include the 4-byte message header
//!
//! ## Last Modified
//! v0.1.0 - Initial message definitions

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use corelink_common::{PeerId, Timestamp};

use crate::crypto::HMAC_SIZE;
use crate::error::{CoreError, Result};

// ============================================
// Size Constants
// ============================================

/// Size of the generic message header.
pub const MESSAGE_HEADER_SIZE: usize = 4;

/// Size of the cleartext encrypted-frame header.
pub const ENCRYPTED_HEADER_SIZE: usize = 56;

/// Offset of the HMAC inside the encrypted-frame header.
pub const ENCRYPTED_HEADER_HMAC_OFFSET: usize = ENCRYPTED_HEADER_SIZE - HMAC_SIZE;

/// Size of a PING message.
pub const PING_MESSAGE_SIZE: usize = 44;

/// Size of a PONG message.
pub const PONG_MESSAGE_SIZE: usize = 48;

/// Largest encrypted frame handed to a transport.
pub const MAX_ENCRYPTED_MESSAGE_SIZE: usize = 63 * 1024;

/// Largest message expressible by a 16-bit size field.
pub const MAX_MESSAGE_SIZE: usize = u16::MAX as usize;

// ============================================
// MessageType
// ============================================

/// Message types interpreted by the link layer itself.
///
/// Any other value is an application type and is handed to local clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum MessageType {
    /// Encrypted frame carrying a batch of messages.
    EncryptedMessage = 82,
    /// Liveness check with a challenge.
    Ping = 83,
    /// Answer to a PING.
    Pong = 84,
}

impl MessageType {
    /// Maps a wire value to a link-layer type, `None` for application types.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            82 => Some(Self::EncryptedMessage),
            83 => Some(Self::Ping),
            84 => Some(Self::Pong),
            _ => None,
        }
    }

    /// Wire value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

impl From<MessageType> for u16 {
    fn from(msg_type: MessageType) -> Self {
        msg_type.as_u16()
    }
}

// ============================================
// MessageHeader
// ============================================

/// Generic 4-byte header in front of every message.
///
/// ```text
/// ┌──────────────┬──────────────┐
/// │ size (u16)   │ type (u16)   │
/// └──────────────┴──────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Total size including this header
    pub size: u16,
    /// Message type
    pub msg_type: u16,
}

impl MessageHeader {
    /// Reads the header at the start of `buf` without consuming it.
    ///
    /// # Errors
    /// `MessageTooShort` if fewer than 4 bytes are present, `MalformedMessage`
    /// if the declared size is smaller than the header itself.
    pub fn peek(buf: &[u8]) -> Result<Self> {
        if buf.len() < MESSAGE_HEADER_SIZE {
            return Err(CoreError::too_short(MESSAGE_HEADER_SIZE, buf.len()));
        }
        let size = u16::from_be_bytes([buf[0], buf[1]]);
        let msg_type = u16::from_be_bytes([buf[2], buf[3]]);
        if usize::from(size) < MESSAGE_HEADER_SIZE {
            return Err(CoreError::malformed(format!(
                "declared size {size} smaller than header"
            )));
        }
        Ok(Self { size, msg_type })
    }

    /// Validates that `buf` is exactly one well-formed message.
    ///
    /// # Errors
    /// Propagates `peek` errors, `MalformedMessage` on size mismatch.
    pub fn parse_exact(buf: &[u8]) -> Result<Self> {
        let header = Self::peek(buf)?;
        if usize::from(header.size) != buf.len() {
            return Err(CoreError::malformed(format!(
                "declared size {} but buffer holds {}",
                header.size,
                buf.len()
            )));
        }
        Ok(header)
    }
}

// ============================================
// EncryptedHeader
// ============================================

/// Cleartext header of an encrypted frame.
///
/// # Wire Format
/// ```text
/// ┌────────────────────────────────────────────────────────┐
/// │ size u16 | type u16 = 82                    (4)        │
/// │ iv_seed u32                                 (4)        │
/// │ sequence_number u32                         (4)        │
/// │ inbound_bw_limit u32 (bytes/s)              (4)        │
/// │ timestamp u64 (µs since epoch)              (8)        │
/// │ hmac [u8; 32]                               (32)       │
/// └────────────────────────────────────────────────────────┘
/// ```
///
/// Everything before `hmac` is AEAD associated data and is covered by the
/// HMAC, so none of it can be altered in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedHeader {
    /// Total frame size including the ciphertext
    pub size: u16,
    /// Random per-frame seed for IV and auth-key derivation
    pub iv_seed: u32,
    /// Strictly increasing per session key
    pub sequence_number: u32,
    /// Bandwidth the sender is willing to receive from us
    pub inbound_bw_limit: u32,
    /// Sender wall-clock time
    pub timestamp: Timestamp,
    /// HMAC-SHA256 over the header prefix and ciphertext
    pub hmac: [u8; HMAC_SIZE],
}

impl EncryptedHeader {
    /// New header with a zero HMAC; `size` is filled in when sealing.
    #[must_use]
    pub const fn new(
        iv_seed: u32,
        sequence_number: u32,
        inbound_bw_limit: u32,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            size: 0,
            iv_seed,
            sequence_number,
            inbound_bw_limit,
            timestamp,
            hmac: [0u8; HMAC_SIZE],
        }
    }
}

// ============================================
// PingMessage
// ============================================

/// Keep-alive and session confirmation probe.
///
/// `target` must name the receiver, otherwise the PING is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingMessage {
    /// Random seed, not interpreted by the receiver
    pub iv_seed: u32,
    /// Echoed back in the PONG
    pub challenge: u32,
    /// Intended receiver
    pub target: PeerId,
}

// ============================================
// PongMessage
// ============================================

/// Answer to a [`PingMessage`].
///
/// `target` names the sender of the PONG, `inbound_bw_limit` is the
/// bandwidth it is willing to receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PongMessage {
    /// Random seed, not interpreted by the receiver
    pub iv_seed: u32,
    /// Challenge copied from the PING
    pub challenge: u32,
    /// Bandwidth the responder accepts from us
    pub inbound_bw_limit: u32,
    /// Identity of the responder
    pub target: PeerId,
}

// ============================================
// RawMessage
// ============================================

/// One message cut out of a decrypted payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Parsed header
    pub header: MessageHeader,
    /// Full message bytes, header included
    pub bytes: Bytes,
}

impl RawMessage {
    /// First 4 bytes only, for header-level observers.
    #[must_use]
    pub fn header_bytes(&self) -> Bytes {
        self.bytes.slice(..MESSAGE_HEADER_SIZE)
    }
}

// ============================================
// Tests
// ============================================
