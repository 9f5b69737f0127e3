// ============================================
// File: crates/corelink-core/src/crypto/keys.rs
// ============================================
//! # Cryptographic Key Types
//!
//! ## Creation Reason
//! Identity, session and per-frame keys. Secret bytes are wiped on drop.
//!
//! ## Main Functionality
//! - `IdentityKeyPair`: Long-term Ed25519 key naming this node
//! - `SessionKey`: Symmetric key for one direction of one neighbour
//! - `AuthKey`: Per-frame HMAC key derived from a `SessionKey`
//!
//! ## Key Lifecycle
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  IdentityKeyPair (long-term)                               │
//! │  └─ PeerId = SHA-256(public key)                           │
//! │                                                            │
//! │  SessionKey (per neighbour, per direction)                 │
//! │  ├─ outbound: generated locally when the neighbour appears │
//! │  └─ inbound: delivered by the key exchange                 │
//! │                                                            │
//! │  AuthKey (per frame)                                       │
//! │  └─ derived from SessionKey + iv_seed + creation time      │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Private and symmetric keys are never logged; `Debug` is redacted
//!
//! ## Last Modified
//! v0.1.0 - Initial key type definitions

use std::fmt;

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use corelink_common::PeerId;

use super::{CHACHA20_KEY_SIZE, ED25519_PUBLIC_KEY_SIZE, HMAC_SIZE};
use crate::error::{CoreError, Result};

// ============================================
// IdentityKeyPair (Ed25519)
// ============================================

/// Long-term Ed25519 identity of this node.
///
/// # Example
/// ```
/// use corelink_core::crypto::IdentityKeyPair;
///
/// let identity = IdentityKeyPair::generate();
/// let restored = IdentityKeyPair::from_bytes(&identity.to_bytes()).unwrap();
/// assert_eq!(identity.peer_id(), restored.peer_id());
/// ```
pub struct IdentityKeyPair {
    signing_key: SigningKey,
}

impl IdentityKeyPair {
    /// Generates a new random identity key pair.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Restores an identity from its 32-byte secret seed.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the slice is not 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::invalid_key(format!("identity seed is {} bytes", bytes.len())))?;
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Ok(Self { signing_key })
    }

    /// Exports the secret seed for storage.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Returns the raw public key bytes.
    #[must_use]
    pub fn public_key_bytes(&self) -> [u8; ED25519_PUBLIC_KEY_SIZE] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Identity under which neighbours know this node.
    #[must_use]
    pub fn peer_id(&self) -> PeerId {
        PeerId::from_public_key(&self.public_key_bytes())
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("peer_id", &self.peer_id())
            .finish_non_exhaustive()
    }
}

// ============================================
// SessionKey
// ============================================

/// Directional frame key. Wiped on drop and kept out of logs.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; CHACHA20_KEY_SIZE]);

impl SessionKey {
    /// Creates a session key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; CHACHA20_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Fresh random key from the OS generator.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; CHACHA20_KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; CHACHA20_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey([REDACTED])")
    }
}

// ============================================
// AuthKey
// ============================================

/// HMAC key valid for exactly one frame.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AuthKey([u8; HMAC_SIZE]);

impl AuthKey {
    pub(crate) fn from_bytes(bytes: [u8; HMAC_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; HMAC_SIZE] {
        &self.0
    }
}

impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthKey([REDACTED])")
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_keypair_generation() {
        let kp1 = IdentityKeyPair::generate();
        let kp2 = IdentityKeyPair::generate();
        assert_ne!(kp1.public_key_bytes(), kp2.public_key_bytes());
        assert_ne!(kp1.peer_id(), kp2.peer_id());
    }

    #[test]
    fn test_identity_keypair_restore() {
        let kp = IdentityKeyPair::generate();
        let restored = IdentityKeyPair::from_bytes(&kp.to_bytes()).unwrap();
        assert_eq!(kp.public_key_bytes(), restored.public_key_bytes());
        assert!(IdentityKeyPair::from_bytes(&[0u8; 16]).is_err());
    }

    #[test]
    fn test_session_key_generate_is_random() {
        let a = SessionKey::generate();
        let b = SessionKey::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SessionKey::from_bytes([0x42; 32]);
        assert_eq!(format!("{key:?}"), "SessionKey([REDACTED])");
        assert!(!format!("{:?}", IdentityKeyPair::generate()).contains("signing_key"));
    }
}
