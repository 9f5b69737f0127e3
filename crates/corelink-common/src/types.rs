// ============================================
// File: crates/corelink-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Neighbours are addressed by a 32-byte identity derived from their
//! long-term Ed25519 public key. The same bytes appear inside PING and
//! PONG messages and feed into IV derivation, so the type lives here.
//!
//! ## Main Functionality
//! - `PeerId`: neighbour identity (hash of the public key)
//! - Base64 text form, hex-prefixed debug form, serde support
//!
//! ## ⚠️ Important Note for Next Developer
//! - `PeerId` is public information, so it is `Copy` and not zeroized
//! - Human-readable serde formats use base64, binary formats use raw bytes
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================
// Constants
// ============================================

/// Size of a `PeerId` in bytes.
pub const PEER_ID_SIZE: usize = 32;

// ============================================
// PeerId Error Type
// ============================================

/// Error type for `PeerId` parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerIdError {
    /// Base64 decoding failed
    #[error("Invalid base64: {0}")]
    InvalidBase64(String),
    /// Decoded bytes have wrong length
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Required length
        expected: usize,
        /// Length found
        actual: usize,
    },
}

// ============================================
// PeerId
// ============================================

/// Identity of a neighbour.
///
/// # Wire Format
/// ```text
/// ┌────────────────────────────────────┐
/// │  SHA-256(ed25519 public key) (32)  │
/// └────────────────────────────────────┘
/// ```
///
/// # Example
/// ```
/// use corelink_common::types::PeerId;
///
/// let peer = PeerId::from_public_key(&[7u8; 32]);
/// let text = peer.to_string();
/// let parsed: PeerId = text.parse().unwrap();
/// assert_eq!(peer, parsed);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId([u8; PEER_ID_SIZE]);

impl PeerId {
    /// Wraps raw identity bytes.
    #[must_use]
    pub const fn new(bytes: [u8; PEER_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Creates a `PeerId` from a slice, `None` unless it is exactly 32 bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; PEER_ID_SIZE] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Derives the identity of the holder of `public_key`.
    #[must_use]
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        let digest = Sha256::digest(public_key);
        let mut id = [0u8; PEER_ID_SIZE];
        id.copy_from_slice(&digest);
        Self(id)
    }

    /// Random identity, mostly useful for tests and simulations.
    #[must_use]
    pub fn random() -> Self {
        let mut id = [0u8; PEER_ID_SIZE];
        rand::thread_rng().fill_bytes(&mut id);
        Self(id)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PEER_ID_SIZE] {
        &self.0
    }

    /// Lowercase hex encoding of the full identity.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PeerId({:02x}{:02x}{:02x}{:02x}...)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", BASE64.encode(self.0))
    }
}

impl FromStr for PeerId {
    type Err = PeerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = BASE64
            .decode(s)
            .map_err(|e| PeerIdError::InvalidBase64(e.to_string()))?;
        Self::from_bytes(&bytes).ok_or(PeerIdError::InvalidLength {
            expected: PEER_ID_SIZE,
            actual: bytes.len(),
        })
    }
}

impl Serialize for PeerId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&BASE64.encode(self.0))
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for PeerId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            Self::from_bytes(&bytes)
                .ok_or_else(|| serde::de::Error::invalid_length(bytes.len(), &"32 bytes"))
        }
    }
}

impl AsRef<[u8]> for PeerId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_from_public_key_is_deterministic() {
        let a = PeerId::from_public_key(&[1u8; 32]);
        let b = PeerId::from_public_key(&[1u8; 32]);
        let c = PeerId::from_public_key(&[2u8; 32]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_peer_id_from_bytes_length() {
        assert!(PeerId::from_bytes(&[0u8; 32]).is_some());
        assert!(PeerId::from_bytes(&[0u8; 31]).is_none());
        assert!(PeerId::from_bytes(&[0u8; 33]).is_none());
    }

    #[test]
    fn test_peer_id_parse_errors() {
        assert!(matches!(
            "not base64!!".parse::<PeerId>(),
            Err(PeerIdError::InvalidBase64(_))
        ));
        assert!(matches!(
            "AAAA".parse::<PeerId>(),
            Err(PeerIdError::InvalidLength { expected: 32, actual: 3 })
        ));
    }

    #[test]
    fn test_peer_id_debug_is_truncated() {
        let peer = PeerId::new([0xab; 32]);
        assert_eq!(format!("{peer:?}"), "PeerId(abababab...)");
    }

    #[test]
    fn test_peer_id_json() {
        let peer = PeerId::random();
        let json = serde_json::to_string(&peer).unwrap();
        let back: PeerId = serde_json::from_str(&json).unwrap();
        assert_eq!(peer, back);
    }
}
